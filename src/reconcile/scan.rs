//! Early-terminating scan of a category's index
//!
//! Non-boosted listings appear on the index in reverse repost order. Once the
//! scan meets a non-boosted listing reposted before the last scrape, every
//! listing after it was already seen, so the scan stops there. Boosted
//! listings are placed out of order by the site and never stop the scan.

use crate::crawler::{CombinedUrlMap, MarketplaceSource};
use crate::model::{epoch_sentinel, Listing};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Detail pages already fetched, by url; `None` when the page yielded nothing
pub type Prefetched = HashMap<String, Option<Listing>>;

/// What the scan accepted, and where it stopped
#[derive(Debug, Default)]
pub struct ScanResult {
    /// For-sale listings to classify, in index order
    pub candidates: Vec<Listing>,
    /// Listings marked sold on their detail page
    pub sold_candidates: Vec<Listing>,
    /// For-sale candidates whose url is in the sold dataset
    pub relisted_urls: Vec<String>,
    /// Detail pages requested
    pub evaluated: usize,
    /// Detail pages that yielded no listing
    pub skipped: usize,
    /// Sold listings already in the sold dataset
    pub already_sold: usize,
    /// Index position of the listing that stopped the scan
    pub stopped_at: Option<usize>,
    /// The listing that stopped the scan, kept for a resumed scan
    pub stopper: Option<Listing>,
}

impl ScanResult {
    fn route(&mut self, listing: Listing, sold_urls: &HashSet<String>) {
        let known_sold = sold_urls.contains(&listing.url);
        if listing.is_sold() {
            if known_sold {
                self.already_sold += 1;
            } else {
                self.sold_candidates.push(listing);
            }
        } else {
            if known_sold {
                self.relisted_urls.push(listing.url.clone());
            }
            self.candidates.push(listing);
        }
    }
}

/// Listings fetched past the stop point, and whether one of them was recent
#[derive(Debug, Default)]
pub struct OrderingCheck {
    pub broken: bool,
    pub fetched: Prefetched,
}

/// Scans `url_map` in order, fetching each listing until the stop rule fires
///
/// # Arguments
///
/// * `source` - Where detail pages come from
/// * `category_num` - Category being scanned
/// * `url_map` - Index listings in index order
/// * `sold_urls` - Urls already in the sold dataset
/// * `boundary` - Day of the last scrape; older non-boosted listings stop the scan
/// * `delay` - Politeness delay per detail request
pub async fn early_termination_scan<S>(
    source: &S,
    category_num: i64,
    url_map: &CombinedUrlMap,
    sold_urls: &HashSet<String>,
    boundary: NaiveDate,
    delay: Duration,
) -> ScanResult
where
    S: MarketplaceSource + ?Sized,
{
    let mut result = ScanResult::default();
    scan_from(
        source,
        category_num,
        url_map,
        sold_urls,
        boundary,
        delay,
        0,
        &mut Prefetched::new(),
        &mut result,
    )
    .await;
    result
}

/// Continues a stopped scan to the end of the index without a boundary
///
/// The listing that stopped the scan and any `prefetched` pages are used as
/// they are; only listings never fetched are requested.
pub async fn resume_scan<S>(
    source: &S,
    category_num: i64,
    url_map: &CombinedUrlMap,
    sold_urls: &HashSet<String>,
    delay: Duration,
    mut result: ScanResult,
    mut prefetched: Prefetched,
) -> ScanResult
where
    S: MarketplaceSource + ?Sized,
{
    let Some(stopped_at) = result.stopped_at.take() else {
        return result;
    };
    if let Some(stopper) = result.stopper.take() {
        result.route(stopper, sold_urls);
    }

    scan_from(
        source,
        category_num,
        url_map,
        sold_urls,
        epoch_sentinel(),
        delay,
        stopped_at + 1,
        &mut prefetched,
        &mut result,
    )
    .await;
    result
}

#[allow(clippy::too_many_arguments)]
async fn scan_from<S>(
    source: &S,
    category_num: i64,
    url_map: &CombinedUrlMap,
    sold_urls: &HashSet<String>,
    boundary: NaiveDate,
    delay: Duration,
    start: usize,
    prefetched: &mut Prefetched,
    result: &mut ScanResult,
) where
    S: MarketplaceSource + ?Sized,
{
    for (position, (url, &boosted)) in url_map.iter().enumerate().skip(start) {
        result.evaluated += 1;

        let fetched = match prefetched.remove(url) {
            Some(fetched) => fetched,
            None => source.listing(url, category_num, delay).await,
        };
        let Some(listing) = fetched else {
            result.skipped += 1;
            continue;
        };

        if !boosted && listing.repost_day() < boundary {
            tracing::debug!(
                "Category {}: stopping at {} (reposted {}, boundary {})",
                category_num,
                url,
                listing.repost_day(),
                boundary
            );
            result.stopped_at = Some(position);
            result.stopper = Some(listing);
            break;
        }

        result.route(listing, sold_urls);
    }
}

/// Checks whether the index ordering held past the stop point
///
/// Fetches up to `count` non-boosted listings after `stopped_at` and reports
/// whether any of them was reposted on or after `boundary`. The fetched pages
/// are returned for reuse.
pub async fn check_past_stop<S>(
    source: &S,
    category_num: i64,
    url_map: &CombinedUrlMap,
    stopped_at: usize,
    count: usize,
    boundary: NaiveDate,
    delay: Duration,
) -> OrderingCheck
where
    S: MarketplaceSource + ?Sized,
{
    let mut result = OrderingCheck::default();
    let tail = url_map
        .iter()
        .skip(stopped_at + 1)
        .filter(|(_, &boosted)| !boosted)
        .take(count);

    for (url, _) in tail {
        let fetched = source.listing(url, category_num, delay).await;
        let recent = fetched
            .as_ref()
            .is_some_and(|listing| listing.repost_day() >= boundary);
        if recent {
            tracing::debug!(
                "Category {}: {} is recent but sits past the stop point",
                category_num,
                url
            );
        }
        result.fetched.insert(url.clone(), fetched);
        if recent {
            result.broken = true;
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fake::FakeSource;
    use crate::model::test_support::listing;

    fn boundary() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, 10).unwrap()
    }

    fn map(entries: &[(&str, bool)]) -> CombinedUrlMap {
        entries
            .iter()
            .map(|(url, boosted)| (url.to_string(), *boosted))
            .collect()
    }

    #[tokio::test]
    async fn test_stops_at_first_old_listing() {
        let source = FakeSource::new()
            .with_listing(listing("boosted-old", "2023-09-01"))
            .with_listing(listing("new", "2023-10-12"))
            .with_listing(listing("old", "2023-10-01"))
            .with_listing(listing("newer", "2023-10-13"));
        let url_map = map(&[
            ("boosted-old", true),
            ("new", false),
            ("old", false),
            ("newer", false),
        ]);

        let result = early_termination_scan(
            &source,
            2,
            &url_map,
            &HashSet::new(),
            boundary(),
            Duration::ZERO,
        )
        .await;

        let accepted: Vec<&str> = result.candidates.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(accepted, vec!["boosted-old", "new"]);
        assert_eq!(result.stopped_at, Some(2));
        assert_eq!(result.evaluated, 3);
        assert_eq!(source.requested(), vec!["boosted-old", "new", "old"]);
    }

    #[tokio::test]
    async fn test_boundary_day_is_accepted() {
        let source = FakeSource::new().with_listing(listing("same-day", "2023-10-10"));
        let result = early_termination_scan(
            &source,
            2,
            &map(&[("same-day", false)]),
            &HashSet::new(),
            boundary(),
            Duration::ZERO,
        )
        .await;

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.stopped_at, None);
    }

    #[tokio::test]
    async fn test_unparseable_listing_does_not_stop() {
        let source = FakeSource::new().with_listing(listing("ok", "2023-10-12"));
        let result = early_termination_scan(
            &source,
            2,
            &map(&[("gone", false), ("ok", false)]),
            &HashSet::new(),
            boundary(),
            Duration::ZERO,
        )
        .await;

        assert_eq!(result.skipped, 1);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.stopped_at, None);
    }

    #[tokio::test]
    async fn test_routes_sold_listings() {
        let mut sold = listing("sold", "2023-10-12");
        sold.still_for_sale = "SOLD".to_string();
        let mut known = listing("known-sold", "2023-10-12");
        known.still_for_sale = "Sold".to_string();

        let source = FakeSource::new()
            .with_listing(sold)
            .with_listing(known)
            .with_listing(listing("for-sale", "2023-10-12"));
        let sold_urls: HashSet<String> = ["known-sold".to_string()].into_iter().collect();

        let result = early_termination_scan(
            &source,
            2,
            &map(&[("sold", false), ("known-sold", false), ("for-sale", false)]),
            &sold_urls,
            boundary(),
            Duration::ZERO,
        )
        .await;

        assert_eq!(result.sold_candidates.len(), 1);
        assert_eq!(result.sold_candidates[0].url, "sold");
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.already_sold, 1);
        assert!(result.relisted_urls.is_empty());
    }

    #[tokio::test]
    async fn test_check_past_stop_finds_out_of_order_listing() {
        let source = FakeSource::new()
            .with_listing(listing("old", "2023-10-01"))
            .with_listing(listing("boosted", "2023-10-13"))
            .with_listing(listing("older", "2023-09-20"))
            .with_listing(listing("recent", "2023-10-12"));
        let url_map = map(&[
            ("old", false),
            ("boosted", true),
            ("older", false),
            ("recent", false),
        ]);

        // The boosted entry is skipped, so a count of one only reaches "older"
        let short = check_past_stop(&source, 2, &url_map, 0, 1, boundary(), Duration::ZERO).await;
        assert!(!short.broken);
        assert_eq!(short.fetched.len(), 1);

        let long = check_past_stop(&source, 2, &url_map, 0, 2, boundary(), Duration::ZERO).await;
        assert!(long.broken);
        assert!(long.fetched.contains_key("recent"));
    }

    #[tokio::test]
    async fn test_sold_url_back_on_sale_is_a_candidate() {
        let source = FakeSource::new().with_listing(listing("relisted", "2023-10-12"));
        let sold_urls: HashSet<String> = ["relisted".to_string()].into_iter().collect();

        let result = early_termination_scan(
            &source,
            2,
            &map(&[("relisted", false)]),
            &sold_urls,
            boundary(),
            Duration::ZERO,
        )
        .await;

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.relisted_urls, vec!["relisted".to_string()]);
        assert_eq!(result.already_sold, 0);
    }

    #[tokio::test]
    async fn test_resume_reuses_fetched_pages() {
        let source = FakeSource::new()
            .with_listing(listing("new", "2023-10-12"))
            .with_listing(listing("old", "2023-10-01"))
            .with_listing(listing("late", "2023-10-13"))
            .with_listing(listing("older", "2023-09-01"));
        let url_map = map(&[
            ("new", false),
            ("old", false),
            ("late", false),
            ("older", false),
        ]);

        let scan = early_termination_scan(
            &source,
            2,
            &url_map,
            &HashSet::new(),
            boundary(),
            Duration::ZERO,
        )
        .await;
        assert_eq!(scan.stopped_at, Some(1));

        let check = check_past_stop(&source, 2, &url_map, 1, 2, boundary(), Duration::ZERO).await;
        assert!(check.broken);

        let resumed = resume_scan(
            &source,
            2,
            &url_map,
            &HashSet::new(),
            Duration::ZERO,
            scan,
            check.fetched,
        )
        .await;

        let accepted: Vec<&str> = resumed.candidates.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(accepted, vec!["new", "old", "late", "older"]);
        assert_eq!(resumed.stopped_at, None);
        assert_eq!(resumed.evaluated, 4);
        assert_eq!(source.requested(), vec!["new", "old", "late", "older"]);
    }
}
