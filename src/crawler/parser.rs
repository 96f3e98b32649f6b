//! HTML parser for the marketplace's index and detail pages
//!
//! # Index pages
//!
//! Each listing sits in a `div.bsitem` block. The first link in the block that
//! points at `/buysell/<id>/` is the listing URL. A block is boosted when one
//! of its classes, or a class of any element inside it, mentions "boost".
//! Pagination links point back at `/buysell/list/?...&page=N`.
//!
//! # Detail pages
//!
//! The title is the `h1.buysell-title` (any `h1` as a fallback), the price the
//! `.buysell-price` block, and the description the
//! `.buysell-container.description` block. Everything else is a labelled row of
//! the form `<div><b>Label:</b> value</div>`.

use crate::model::{coerce_number, parse_listing_date, split_price, Listing};
use crate::url::MarketplaceUrls;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// One listing link found on an index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub url: String,
    pub boosted: bool,
}

/// Extracts the listing links of one index page, in page order
pub fn parse_index_page(html: &str, urls: &MarketplaceUrls) -> Vec<IndexEntry> {
    let document = Html::parse_document(html);
    let (Ok(item_selector), Ok(link_selector), Ok(boost_selector)) = (
        Selector::parse("div.bsitem"),
        Selector::parse("a[href]"),
        Selector::parse("[class*=\"boost\"]"),
    ) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for item in document.select(&item_selector) {
        let href = item
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| is_listing_href(href));

        let Some(href) = href else {
            continue;
        };

        let url = match urls.resolve_listing(href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping listing link {}: {}", href, e);
                continue;
            }
        };

        let boosted = item.value().classes().any(|c| c.contains("boost"))
            || item.select(&boost_selector).next().is_some();

        entries.push(IndexEntry { url, boosted });
    }

    entries
}

/// Reads the number of index pages from the first page of a category
///
/// A page without any listing yields 0. A page with listings but no
/// pagination is a single page.
pub fn parse_total_pages(html: &str, urls: &MarketplaceUrls) -> u32 {
    let document = Html::parse_document(html);
    let (Ok(item_selector), Ok(link_selector)) =
        (Selector::parse("div.bsitem"), Selector::parse("a[href]"))
    else {
        return 0;
    };

    if document.select(&item_selector).next().is_none() {
        return 0;
    }

    let highest = document
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| urls.base().join(href).ok())
        .filter(|url| url.path().starts_with("/buysell/list"))
        .filter_map(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse::<u32>().ok())
        })
        .max()
        .unwrap_or(1);

    highest.max(1)
}

/// Parses a listing detail page
///
/// Returns `None` when the page does not carry a listing: the ad was delisted,
/// or the page is an error or placeholder page. `datetime_scraped` is set to
/// `scraped_at`.
pub fn parse_listing(
    html: &str,
    url: &str,
    category_num: i64,
    scraped_at: DateTime<Utc>,
) -> Option<Listing> {
    let document = Html::parse_document(html);

    let ad_title = first_text(&document, "h1.buysell-title").or_else(|| first_text(&document, "h1"))?;
    let details = labelled_rows(&document);

    let last_repost_date = details
        .get("last repost date")
        .and_then(|raw| parse_listing_date(raw))?;
    let still_for_sale = details.get("still for sale")?.clone();

    let (price, currency) = first_text(&document, ".buysell-price")
        .map(|raw| split_price(&raw))
        .unwrap_or((None, None));

    let text = |label: &str| details.get(label).filter(|v| !v.is_empty()).cloned();
    let number = |label: &str| details.get(label).and_then(|raw| coerce_number(raw));

    Some(Listing {
        url: url.to_string(),
        category_num,
        category: text("category"),
        ad_title,
        description: first_text(&document, ".buysell-container.description").unwrap_or_default(),
        price,
        currency,
        location: text("location"),
        condition: text("condition"),
        frame_size: text("frame size"),
        wheel_size: text("wheel size"),
        material: text("material"),
        original_post_date: details
            .get("original post date")
            .and_then(|raw| parse_listing_date(raw)),
        last_repost_date,
        still_for_sale,
        view_count: number("view count"),
        watch_count: number("watch count"),
        datetime_scraped: scraped_at,
    })
}

fn is_listing_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or("");
    let Some(rest) = path.split("/buysell/").nth(1) else {
        return false;
    };
    let id = rest.trim_end_matches('/');
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(collapsed_text)
        .filter(|s| !s.is_empty())
}

/// Whitespace-collapsed text content of an element
fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collects `<b>Label:</b> value` rows keyed by lower-cased label
fn labelled_rows(document: &Html) -> HashMap<String, String> {
    let mut rows = HashMap::new();
    let Ok(label_selector) = Selector::parse("b") else {
        return rows;
    };

    for label in document.select(&label_selector) {
        let label_text = collapsed_text(label);
        let Some(key) = label_text.strip_suffix(':') else {
            continue;
        };
        let Some(row) = label.parent().and_then(ElementRef::wrap) else {
            continue;
        };

        let row_text = collapsed_text(row);
        let value = row_text
            .strip_prefix(label_text.as_str())
            .unwrap_or(&row_text)
            .trim()
            .to_string();

        rows.entry(key.trim().to_lowercase()).or_insert(value);
    }

    rows
}
