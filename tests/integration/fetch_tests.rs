//! Fetcher and HTTP source behavior against a mock server

use crate::support::*;
use listing_tracker::config::UserAgentConfig;
use listing_tracker::crawler::{
    build_http_client, fetch, fetch_with_retry, FetchFailure, HttpSource, MarketplaceSource,
};
use listing_tracker::robots::RobotsPolicy;
use listing_tracker::url::MarketplaceUrls;
use reqwest::Client;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Client {
    build_http_client(&UserAgentConfig {
        crawler_name: "TestTracker".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/about".to_string(),
        contact_email: "admin@example.com".to_string(),
    })
    .expect("Failed to build client")
}

fn source(server: &MockServer) -> HttpSource {
    let urls = MarketplaceUrls::new(&server.uri(), 3).expect("Failed to parse mock uri");
    HttpSource::new(client(), RobotsPolicy::allow_all(), urls, 0)
}

#[tokio::test]
async fn test_fetch_html_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buysell/1001/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html"))
        .mount(&server)
        .await;

    let page = fetch(
        &client(),
        &RobotsPolicy::allow_all(),
        &listing_url(&server, 1001),
        Duration::ZERO,
    )
    .await
    .expect("Fetch failed");

    assert_eq!(page.final_url, listing_url(&server, 1001));
    assert!(page.body.contains("ok"));
}

#[tokio::test]
async fn test_fetch_not_found() {
    let server = MockServer::start().await;

    let result = fetch(
        &client(),
        &RobotsPolicy::allow_all(),
        &listing_url(&server, 1001),
        Duration::ZERO,
    )
    .await;

    assert_eq!(result.unwrap_err(), FetchFailure::Status { status: 404 });
}

#[tokio::test]
async fn test_fetch_rejects_non_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buysell/1001/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let result = fetch(
        &client(),
        &RobotsPolicy::allow_all(),
        &listing_url(&server, 1001),
        Duration::ZERO,
    )
    .await;

    assert!(matches!(result, Err(FetchFailure::ContentMismatch { .. })));
}

#[tokio::test]
async fn test_retry_recovers_from_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buysell/1001/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/buysell/1001/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html"))
        .mount(&server)
        .await;

    let url = listing_url(&server, 1001);
    let page = fetch_with_retry(&client(), &RobotsPolicy::allow_all(), &url, Duration::ZERO, 1)
        .await
        .expect("Retry should have recovered");

    assert!(page.body.contains("ok"));
    assert_eq!(requests_to(&server, "/buysell/1001/").await, 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/buysell/1001/"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let url = listing_url(&server, 1001);
    let result =
        fetch_with_retry(&client(), &RobotsPolicy::allow_all(), &url, Duration::ZERO, 3).await;

    assert_eq!(result.unwrap_err(), FetchFailure::Status { status: 410 });
}

#[tokio::test]
async fn test_total_pages_from_pagination() {
    let server = MockServer::start().await;
    let page_one = r#"<html><body>
        <div class="bsitem"><a href="/buysell/1001/">Bike</a></div>
        <div class="paging">
          <a href="/buysell/list/?region=3&page=2&category=2">2</a>
          <a href="/buysell/list/?region=3&page=3&category=2">3</a>
        </div>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/buysell/list/"))
        .and(query_param("category", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page_one, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/buysell/list/"))
        .and(query_param("category", "7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>No results</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let source = source(&server);
    assert_eq!(source.total_pages(2).await.expect("Page count failed"), 3);
    assert_eq!(source.total_pages(7).await.expect("Page count failed"), 0);
}

#[tokio::test]
async fn test_listing_parsed_with_category_num() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        1001,
        detail_html("Norco Range", "$1,000 CAD", "Yes", old_repost()),
    )
    .await;

    let source = source(&server);
    let listing = source
        .listing(&listing_url(&server, 1001), 2, Duration::ZERO)
        .await
        .expect("Listing should parse");

    assert_eq!(listing.ad_title, "Norco Range");
    assert_eq!(listing.category_num, 2);
    assert_eq!(listing.price, Some(1000.0));
    assert_eq!(listing.last_repost_date, old_repost());
    assert!(!listing.is_sold());

    assert!(source
        .listing(&listing_url(&server, 1002), 2, Duration::ZERO)
        .await
        .is_none());
}
