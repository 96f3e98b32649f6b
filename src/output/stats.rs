//! Session counters and dataset statistics
//!
//! `SessionStats` is filled by the coordinator as categories complete; it is
//! reporting only and never feeds back into reconciliation. `DatasetStatistics`
//! is read from the store for the `--stats` mode.

use crate::model::CategoryDict;
use crate::reconcile::CategoryOutcome;
use crate::storage::{CategoryCounts, DatasetStore, RunRecord};
use crate::TrackerError;

/// Running counters of one tracking session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub categories_processed: u64,
    /// Categories with no listing pages
    pub categories_empty: u64,
    /// Category numbers without a name in the category table
    pub categories_unknown: u64,
    pub categories_failed: u64,

    pub listings_evaluated: u64,
    pub parse_skips: u64,
    pub new_listings: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub sold: u64,
    pub removed: u64,
    pub dropped: u64,
    pub changes: u64,
    pub full_scan_fallbacks: u64,
    /// Categories reconciled with index pages missing
    pub partial_indexes: u64,
    /// Sold listings found for sale again
    pub relisted: u64,
}

impl SessionStats {
    /// Adds one reconciled category to the counters
    pub fn record(&mut self, outcome: &CategoryOutcome) {
        self.categories_processed += 1;
        self.listings_evaluated += outcome.evaluated as u64;
        self.parse_skips += outcome.skipped as u64;
        self.new_listings += outcome.new_listings.len() as u64;
        self.updated += outcome.updated.len() as u64;
        self.unchanged += outcome.unchanged.len() as u64;
        self.sold += outcome.confirmed_sold.len() as u64;
        self.removed += outcome.removed_urls.len() as u64;
        self.dropped += outcome.dropped_urls.len() as u64;
        self.changes += outcome.changes.len() as u64;
        self.relisted += outcome.relisted_urls.len() as u64;
        if outcome.full_scan_fallback {
            self.full_scan_fallbacks += 1;
        }
        if outcome.partial_index {
            self.partial_indexes += 1;
        }
    }

    /// Logs the counters at info level
    pub fn log_summary(&self) {
        tracing::info!(
            "Categories: {} processed, {} empty, {} unknown, {} failed",
            self.categories_processed,
            self.categories_empty,
            self.categories_unknown,
            self.categories_failed
        );
        tracing::info!(
            "Listings: {} new, {} updated, {} unchanged, {} sold, {} removed ({} changes, {} evaluated, {} unparseable)",
            self.new_listings,
            self.updated,
            self.unchanged,
            self.sold,
            self.removed,
            self.changes,
            self.listings_evaluated,
            self.parse_skips
        );
        if self.dropped > 0 {
            tracing::warn!("{} sold listings dropped for lack of numeric fields", self.dropped);
        }
        if self.full_scan_fallbacks > 0 {
            tracing::warn!(
                "{} categories rescanned in full after an ordering check failed",
                self.full_scan_fallbacks
            );
        }
        if self.partial_indexes > 0 {
            tracing::warn!(
                "{} categories had index pages missing; vanished listings were not checked",
                self.partial_indexes
            );
        }
        if self.relisted > 0 {
            tracing::info!("{} sold listings are for sale again", self.relisted);
        }
    }
}

/// What the database currently holds
#[derive(Debug, Clone)]
pub struct DatasetStatistics {
    pub per_category: Vec<CategoryCounts>,
    pub latest_run: Option<RunRecord>,
}

impl DatasetStatistics {
    pub fn total_base(&self) -> u64 {
        self.per_category.iter().map(|c| c.base).sum()
    }

    pub fn total_sold(&self) -> u64 {
        self.per_category.iter().map(|c| c.sold).sum()
    }

    pub fn total_changes(&self) -> u64 {
        self.per_category.iter().map(|c| c.changes).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The dataset store to query
///
/// # Returns
///
/// * `Ok(DatasetStatistics)` - Successfully loaded statistics
/// * `Err(TrackerError)` - Failed to query statistics
pub fn load_statistics(store: &dyn DatasetStore) -> Result<DatasetStatistics, TrackerError> {
    Ok(DatasetStatistics {
        per_category: store.dataset_counts()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `categories` - Used to name category numbers
pub fn print_statistics(stats: &DatasetStatistics, categories: &CategoryDict) {
    println!("=== Listing Statistics ===\n");

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
        }
        None => println!("No runs recorded yet"),
    }
    println!();

    println!("Overview:");
    println!("  Active listings: {}", stats.total_base());
    println!("  Sold listings: {}", stats.total_sold());
    println!("  Recorded changes: {}", stats.total_changes());
    println!();

    if stats.per_category.is_empty() {
        return;
    }

    println!("By category:");
    for counts in &stats.per_category {
        let name = categories.name_of(counts.category_num).unwrap_or("(unnamed)");
        println!(
            "  {:>4} {:<28} active {:>6}  sold {:>6}  changes {:>6}",
            counts.category_num, name, counts.base, counts.sold, counts.changes
        );
    }
}
