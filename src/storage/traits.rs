//! Storage traits and error types
//!
//! This module defines the trait interface for dataset backends and
//! associated error types.

use crate::model::{ChangeRecord, Listing};
use crate::storage::{CategoryCounts, CategoryWrite, DataType, ListingColumn, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Category number meaning "every category" in dataset queries
pub const ALL_CATEGORIES: i64 = -1;

/// Trait for dataset backend implementations
///
/// The reconciliation engine reads a category's datasets, then writes its
/// outcome back; a store must return its own writes to later reads.
pub trait DatasetStore {
    // ===== Listing datasets =====

    /// Gets the listings of one dataset, in insertion order
    ///
    /// # Arguments
    ///
    /// * `category_num` - Category to read, or `ALL_CATEGORIES`
    /// * `data_type` - Base or sold dataset
    fn get_dataset(&self, category_num: i64, data_type: DataType) -> StorageResult<Vec<Listing>>;

    /// Appends listings to a dataset
    ///
    /// The sold dataset ignores urls it already holds. Returns the number of
    /// rows written.
    fn write_dataset(&mut self, records: &[Listing], data_type: DataType) -> StorageResult<usize>;

    /// Overwrites the selected columns of base rows, keyed by url
    ///
    /// Returns the number of rows touched.
    fn update_base_data(
        &mut self,
        records: &[Listing],
        cols_to_update: &[ListingColumn],
    ) -> StorageResult<usize>;

    /// Deletes every base row of the given urls
    fn remove_from_base_data(&mut self, urls: &[String]) -> StorageResult<usize>;

    /// Deletes the sold rows of the given urls
    fn remove_from_sold_data(&mut self, urls: &[String]) -> StorageResult<usize>;

    // ===== Change log =====

    /// Gets the change log of one category, or `ALL_CATEGORIES`
    fn get_changes(&self, category_num: i64) -> StorageResult<Vec<ChangeRecord>>;

    /// Appends change records
    fn write_changes(&mut self, records: &[ChangeRecord]) -> StorageResult<usize>;

    // ===== Category writes =====

    /// Applies every write of one reconciled category, all or nothing
    ///
    /// Order: change records, base updates, new base rows, sold removals,
    /// sold rows, base removals.
    fn apply_category(&mut self, write: &CategoryWrite) -> StorageResult<()>;

    // ===== Run Management =====

    /// Creates a new tracking run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    /// Marks a run as failed with a finish timestamp
    fn fail_run(&mut self, run_id: i64) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Row counts of every dataset, per category
    fn dataset_counts(&self) -> StorageResult<Vec<CategoryCounts>>;
}
