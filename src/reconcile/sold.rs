//! Sold confirmation for listings that left the index or show as sold

use crate::crawler::MarketplaceSource;
use crate::model::Listing;
use crate::storage::get_latest_by_scrape_dt;
use std::collections::HashSet;
use std::time::Duration;

/// How the sold candidates of a category were resolved
#[derive(Debug, Default, PartialEq)]
pub struct SoldResolution {
    /// Sold listings to persist, one per url
    pub confirmed_sold: Vec<Listing>,
    /// Base urls that vanished without a sold confirmation
    pub removed_urls: Vec<String>,
    /// Sold listings with no usable numeric field; never persisted
    pub dropped_urls: Vec<String>,
}

/// Confirms sold candidates from the scan and from vanished base listings
///
/// # Arguments
///
/// * `source` - Used to re-fetch each vanished listing
/// * `category_num` - Category being reconciled
/// * `scan_sold` - Listings the scan found marked sold
/// * `vanished` - Base urls missing from the category index
/// * `sold_urls` - Urls already in the sold dataset
/// * `delay` - Politeness delay per re-fetch
pub async fn resolve_sold<S>(
    source: &S,
    category_num: i64,
    scan_sold: Vec<Listing>,
    vanished: &[String],
    sold_urls: &HashSet<String>,
    delay: Duration,
) -> SoldResolution
where
    S: MarketplaceSource + ?Sized,
{
    let mut batch = scan_sold;
    let mut removed_urls = Vec::new();

    for url in vanished {
        match source.listing(url, category_num, delay).await {
            Some(listing) if listing.is_sold() && !sold_urls.contains(url) => {
                tracing::debug!("Confirmed sold: {}", url);
                batch.push(listing);
            }
            _ => {
                tracing::debug!("Removed without sold confirmation: {}", url);
                removed_urls.push(url.clone());
            }
        }
    }

    batch.retain(|listing| !sold_urls.contains(&listing.url));

    let mut confirmed_sold = Vec::new();
    let mut dropped_urls = Vec::new();
    for listing in get_latest_by_scrape_dt(batch) {
        if listing.has_numeric_fields() {
            confirmed_sold.push(listing);
        } else {
            tracing::warn!("Dropping sold listing {} with no numeric fields", listing.url);
            dropped_urls.push(listing.url);
        }
    }

    SoldResolution {
        confirmed_sold,
        removed_urls,
        dropped_urls,
    }
}
