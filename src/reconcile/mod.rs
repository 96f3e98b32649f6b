//! Reconciliation of a category's index against the stored datasets
//!
//! For one category this module:
//! - Scans the index in order, fetching listings until the stop rule fires
//! - Splits scanned listings into new, updated, and unchanged
//! - Emits a change record per changed field of each updated listing
//! - Confirms sold listings and marks vanished ones removed
//! - Writes the outcome back through a `DatasetStore`
//!
//! The scan relies on the index listing non-boosted ads in reverse repost
//! order. With `ordering_check` set, a few listings past the stop point are
//! fetched and the scan resumes to the end of the index when one of them is
//! recent.

mod changelog;
mod classify;
mod scan;
mod sold;

pub use changelog::generate_changelog;
pub use classify::{classify, differs, Classification, UpdatedListing};
pub use scan::{
    check_past_stop, early_termination_scan, resume_scan, OrderingCheck, Prefetched, ScanResult,
};
pub use sold::{resolve_sold, SoldResolution};

use crate::crawler::{CategoryCrawl, CombinedUrlMap, MarketplaceSource};
use crate::model::{epoch_sentinel, ChangeRecord, Listing, TrackedField};
use crate::storage::{
    get_latest_by_scrape_dt, CategoryWrite, DataType, DatasetStore, ListingColumn, StorageResult,
    ALL_CATEGORIES,
};
use crate::TrackerError;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Knobs of the reconciliation engine
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Politeness delay before each detail page request
    pub detail_delay: Duration,
    /// Listings fetched past the stop point to verify index order; 0 disables
    pub ordering_check: usize,
    /// Ignore the last scrape and scan every listing
    pub full_refresh: bool,
}

/// Everything the engine reads for one category
#[derive(Debug, Clone, Copy)]
pub struct CategoryInput<'a> {
    pub category_num: i64,
    /// Index listings in index order
    pub url_map: &'a CombinedUrlMap,
    /// Every index page was fetched; vanished listings are only looked for
    /// on a complete index
    pub index_complete: bool,
    /// Stored base rows of this category
    pub base_data: &'a [Listing],
    /// Latest stored base version of every url, across categories
    pub known_base: &'a HashMap<String, Listing>,
    /// Every url in the sold dataset
    pub sold_urls: &'a HashSet<String>,
    /// Day of the previous scrape of this category
    pub last_scrape_dt: NaiveDate,
}

/// The classified result of one category
#[derive(Debug, Default)]
pub struct CategoryOutcome {
    pub category_num: i64,
    pub new_listings: Vec<Listing>,
    pub updated: Vec<UpdatedListing>,
    pub unchanged: Vec<Listing>,
    pub confirmed_sold: Vec<Listing>,
    pub removed_urls: Vec<String>,
    /// Sold listings dropped for lack of numeric fields
    pub dropped_urls: Vec<String>,
    /// Base urls that already sit in the sold dataset
    pub stale_base_urls: Vec<String>,
    /// Sold urls back on sale; they leave the sold dataset
    pub relisted_urls: Vec<String>,
    pub changes: Vec<ChangeRecord>,
    pub evaluated: usize,
    pub skipped: usize,
    pub already_sold: usize,
    pub stopped_at: Option<usize>,
    /// A listing past the stop point was recent and the scan ran to the end
    pub full_scan_fallback: bool,
    /// Some index pages failed, so no listing was treated as vanished
    pub partial_index: bool,
}

impl CategoryOutcome {
    /// Urls to delete from the base dataset, each once
    pub fn base_removals(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.removed_urls
            .iter()
            .chain(self.confirmed_sold.iter().map(|l| &l.url))
            .chain(self.dropped_urls.iter())
            .chain(self.stale_base_urls.iter())
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect()
    }

    /// Every write of this outcome, for one storage transaction
    pub fn to_write(&self) -> CategoryWrite {
        CategoryWrite {
            changes: self.changes.clone(),
            updated: self.updated.iter().map(|u| u.current.clone()).collect(),
            update_columns: update_columns(),
            new_base: self.new_listings.clone(),
            sold_removals: self.relisted_urls.clone(),
            sold: self.confirmed_sold.clone(),
            base_removals: self.base_removals(),
        }
    }
}

/// Columns overwritten on the stored row of an updated listing
pub fn update_columns() -> Vec<ListingColumn> {
    TrackedField::ALL
        .into_iter()
        .map(ListingColumn::Tracked)
        .chain([
            ListingColumn::CategoryNum,
            ListingColumn::DatetimeScraped,
            ListingColumn::LastRepostDate,
        ])
        .collect()
}

/// The scrape boundary of a category
///
/// The day of the most recent `datetime_scraped` in `base_data`, or the epoch
/// sentinel when nothing is stored or a full refresh is requested.
pub fn last_scrape_boundary(base_data: &[Listing], full_refresh: bool) -> NaiveDate {
    if full_refresh {
        return epoch_sentinel();
    }
    base_data
        .iter()
        .map(|l| l.datetime_scraped.date_naive())
        .max()
        .unwrap_or_else(epoch_sentinel)
}

/// Drives reconciliation of one category at a time
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Classifies one category without writing anything
    ///
    /// Only listing fetches touch the outside world; given the same source
    /// answers the outcome is the same.
    pub async fn reconcile<S>(&self, source: &S, input: CategoryInput<'_>) -> CategoryOutcome
    where
        S: MarketplaceSource + ?Sized,
    {
        let category_num = input.category_num;
        let delay = self.options.detail_delay;

        let mut scan = early_termination_scan(
            source,
            category_num,
            input.url_map,
            input.sold_urls,
            input.last_scrape_dt,
            delay,
        )
        .await;

        let mut full_scan_fallback = false;
        if let Some(stopped_at) = scan.stopped_at {
            if self.options.ordering_check > 0 {
                let check = check_past_stop(
                    source,
                    category_num,
                    input.url_map,
                    stopped_at,
                    self.options.ordering_check,
                    input.last_scrape_dt,
                    delay,
                )
                .await;
                if check.broken {
                    tracing::warn!(
                        "Category {}: recent listing found past the stop point; scanning to the end",
                        category_num
                    );
                    full_scan_fallback = true;
                    scan = resume_scan(
                        source,
                        category_num,
                        input.url_map,
                        input.sold_urls,
                        delay,
                        scan,
                        check.fetched,
                    )
                    .await;
                }
            }
        }

        let ScanResult {
            candidates,
            sold_candidates,
            relisted_urls,
            evaluated,
            skipped,
            already_sold,
            stopped_at,
            stopper: _,
        } = scan;

        if !relisted_urls.is_empty() {
            tracing::info!(
                "Category {}: {} sold listings are for sale again",
                category_num,
                relisted_urls.len()
            );
        }

        let classification = classify(candidates, input.known_base, &TrackedField::ALL);
        let changes = generate_changelog(
            classification
                .updated
                .iter()
                .map(|u| (&u.previous, &u.current)),
            &TrackedField::ALL,
        );

        let mut seen = HashSet::new();
        let base_urls: Vec<&String> = input
            .base_data
            .iter()
            .map(|l| &l.url)
            .filter(|url| seen.insert(url.as_str()))
            .collect();

        let vanished: Vec<String> = if input.index_complete {
            base_urls
                .iter()
                .filter(|url| !input.url_map.contains_key(url.as_str()))
                .filter(|url| !input.sold_urls.contains(url.as_str()))
                .map(|url| (*url).clone())
                .collect()
        } else {
            tracing::warn!(
                "Category {}: index incomplete; not looking for vanished listings",
                category_num
            );
            Vec::new()
        };
        let relisted: HashSet<&str> = relisted_urls.iter().map(String::as_str).collect();
        let stale_base_urls: Vec<String> = base_urls
            .iter()
            .filter(|url| input.sold_urls.contains(url.as_str()))
            .filter(|url| !relisted.contains(url.as_str()))
            .map(|url| (*url).clone())
            .collect();

        let resolution = resolve_sold(
            source,
            category_num,
            sold_candidates,
            &vanished,
            input.sold_urls,
            delay,
        )
        .await;

        CategoryOutcome {
            category_num,
            new_listings: classification.new_listings,
            updated: classification.updated,
            unchanged: classification.unchanged,
            confirmed_sold: resolution.confirmed_sold,
            removed_urls: resolution.removed_urls,
            dropped_urls: resolution.dropped_urls,
            stale_base_urls,
            relisted_urls,
            changes,
            evaluated,
            skipped,
            already_sold,
            stopped_at,
            full_scan_fallback,
            partial_index: !input.index_complete,
        }
    }

    /// Writes an outcome through the store in one transaction
    ///
    /// Either every write of the category lands or none does.
    pub fn apply<D>(&self, store: &mut D, outcome: &CategoryOutcome) -> StorageResult<()>
    where
        D: DatasetStore + ?Sized,
    {
        let write = outcome.to_write();
        store.apply_category(&write)?;
        tracing::debug!(
            "Category {}: removed {} base urls, {} sold urls",
            outcome.category_num,
            write.base_removals.len(),
            write.sold_removals.len()
        );
        Ok(())
    }

    /// Reads a category's datasets, reconciles it, and writes the outcome
    pub async fn run_category<S, D>(
        &self,
        source: &S,
        store: &mut D,
        category_num: i64,
        crawl: &CategoryCrawl,
    ) -> Result<CategoryOutcome, TrackerError>
    where
        S: MarketplaceSource + ?Sized,
        D: DatasetStore + ?Sized,
    {
        let base_data = store.get_dataset(category_num, DataType::Base)?;
        let known_base: HashMap<String, Listing> =
            get_latest_by_scrape_dt(store.get_dataset(ALL_CATEGORIES, DataType::Base)?)
                .into_iter()
                .map(|l| (l.url.clone(), l))
                .collect();
        let sold_urls: HashSet<String> = store
            .get_dataset(ALL_CATEGORIES, DataType::Sold)?
            .into_iter()
            .map(|l| l.url)
            .collect();

        let last_scrape_dt = last_scrape_boundary(&base_data, self.options.full_refresh);
        tracing::info!(
            "Category {}: {} stored listings, scanning back to {}",
            category_num,
            base_data.len(),
            last_scrape_dt
        );

        let outcome = self
            .reconcile(
                source,
                CategoryInput {
                    category_num,
                    url_map: &crawl.urls,
                    index_complete: crawl.is_complete(),
                    base_data: &base_data,
                    known_base: &known_base,
                    sold_urls: &sold_urls,
                    last_scrape_dt,
                },
            )
            .await;

        self.apply(store, &outcome)?;

        tracing::info!(
            "Category {}: {} new, {} updated, {} unchanged, {} sold, {} removed, {} changes",
            category_num,
            outcome.new_listings.len(),
            outcome.updated.len(),
            outcome.unchanged.len(),
            outcome.confirmed_sold.len(),
            outcome.removed_urls.len(),
            outcome.changes.len()
        );

        Ok(outcome)
    }
}
