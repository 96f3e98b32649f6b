//! Storage module for the listing datasets
//!
//! This module handles all database operations for the tracker, including:
//! - SQLite database initialization and schema management
//! - The base (active) and sold listing datasets
//! - The append-only change log
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{DatasetStore, StorageError, StorageResult, ALL_CATEGORIES};

use crate::model::{ChangeRecord, Listing, TrackedField};
use std::collections::HashMap;

/// The listing datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Active listings
    Base,
    /// Listings confirmed sold
    Sold,
}

impl DataType {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Base => "base_listings",
            Self::Sold => "sold_listings",
        }
    }
}

/// A column that can be overwritten in place on a base row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingColumn {
    Tracked(TrackedField),
    CategoryNum,
    DatetimeScraped,
    LastRepostDate,
}

impl ListingColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracked(field) => field.as_str(),
            Self::CategoryNum => "category_num",
            Self::DatetimeScraped => "datetime_scraped",
            Self::LastRepostDate => "last_repost_date",
        }
    }
}

/// Every write of one reconciled category
#[derive(Debug, Clone, Default)]
pub struct CategoryWrite {
    pub changes: Vec<ChangeRecord>,
    /// Current versions of updated listings
    pub updated: Vec<Listing>,
    pub update_columns: Vec<ListingColumn>,
    pub new_base: Vec<Listing>,
    /// Urls leaving the sold dataset because they are on sale again
    pub sold_removals: Vec<String>,
    pub sold: Vec<Listing>,
    pub base_removals: Vec<String>,
}

/// Represents a tracking run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a tracking run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Stored row counts of one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub category_num: i64,
    pub base: u64,
    pub sold: u64,
    pub changes: u64,
}

/// Keeps the latest version of every url, by `datetime_scraped`
///
/// Urls keep the position of their first occurrence. On equal timestamps the
/// later record wins.
pub fn get_latest_by_scrape_dt(records: Vec<Listing>) -> Vec<Listing> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<Listing> = Vec::new();

    for record in records {
        match position.get(&record.url) {
            Some(&i) => {
                if record.datetime_scraped >= latest[i].datetime_scraped {
                    latest[i] = record;
                }
            }
            None => {
                position.insert(record.url.clone(), latest.len());
                latest.push(record);
            }
        }
    }

    latest
}
