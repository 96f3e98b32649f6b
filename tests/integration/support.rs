//! Mock marketplace pages and session setup shared by the integration tests

use chrono::{NaiveDateTime, Utc};
use listing_tracker::config::{parse_config, Config};
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration pointing at the mock server, with a single category (2)
pub fn test_config(base_url: &str, db_path: &Path, extra_scraper: &str) -> Config {
    parse_config(&format!(
        r#"
[scraper]
delay-ms = 0
concurrency = 2
max-retries = 0
{extra_scraper}

[source]
base-url = "{base_url}"

[user-agent]
crawler-name = "TestTracker"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "{}"

[categories]
"Enduro Bikes" = 2
"#,
        db_path.display()
    ))
    .expect("Failed to parse test config")
}

/// Listing link path for a listing id
pub fn listing_path(id: u32) -> String {
    format!("/buysell/{}/", id)
}

/// Identity url of a listing on the mock server
pub fn listing_url(server: &MockServer, id: u32) -> String {
    format!("{}{}", server.uri(), listing_path(id))
}

/// One index page holding the given listings, newest first
pub fn index_html(ids: &[u32]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="bsitem"><a href="{}">Bike {}</a></div>"#,
                listing_path(*id),
                id
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", items)
}

pub fn now_repost() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn old_repost() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2023-01-05 10:00:00", "%Y-%m-%d %H:%M:%S")
        .expect("valid date")
}

/// A listing detail page
pub fn detail_html(title: &str, price: &str, status: &str, repost: NaiveDateTime) -> String {
    format!(
        r#"<html><body>
          <h1 class="buysell-title">{title}</h1>
          <div class="buysell-container buysell-price">{price}</div>
          <div class="buysell-container details">
            <div><b>Category:</b> Enduro Bikes</div>
            <div><b>Condition:</b> Good - Used, Mechanically Sound</div>
            <div><b>Original Post Date:</b> Jan-02-2023 08:00:00</div>
            <div><b>Last Repost Date:</b> {}</div>
            <div><b>Still For Sale:</b> {status}</div>
            <div><b>View Count:</b> 310</div>
            <div><b>Watch Count:</b> 4</div>
          </div>
          <div class="buysell-container description">Well looked after.</div>
        </body></html>"#,
        repost.format("%b-%d-%Y %H:%M:%S")
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

/// Serves page 1 of category 2's index
pub async fn mount_index(server: &MockServer, ids: &[u32]) {
    Mock::given(method("GET"))
        .and(path("/buysell/list/"))
        .and(query_param("category", "2"))
        .and(query_param("page", "1"))
        .respond_with(html(index_html(ids)))
        .mount(server)
        .await;
}

/// Serves one page of category 2's index, linking pages up to `last_page`
pub async fn mount_index_page(server: &MockServer, page: u32, last_page: u32, ids: &[u32]) {
    let pagination: String = (1..=last_page)
        .map(|p| format!(r#"<a href="/buysell/list/?category=2&page={p}">{p}</a>"#))
        .collect();
    let body = index_html(ids).replace("</body>", &format!("{pagination}</body>"));

    Mock::given(method("GET"))
        .and(path("/buysell/list/"))
        .and(query_param("category", "2"))
        .and(query_param("page", page.to_string()))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Serves one listing detail page
pub async fn mount_listing(server: &MockServer, id: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(listing_path(id)))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Number of requests the server received for a path
pub async fn requests_to(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
