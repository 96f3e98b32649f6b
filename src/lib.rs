//! Listing-Tracker: incremental tracking of a classified-ads marketplace
//!
//! This crate crawls the listing index pages of a marketplace category by
//! category, fetches listing detail pages, and reconciles what it sees against
//! the previously persisted dataset: new listings are added, changed listings are
//! updated with a field-level change log, and vanished listings are confirmed
//! sold or marked removed.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod reconcile;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Listing-Tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch failed for {url}: {failure}")]
    Fetch {
        url: String,
        failure: crawler::FetchFailure,
    },

    #[error("Category {category_num} failed: {message}")]
    Category { category_num: i64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] ::url::ParseError),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Listing URL is outside the marketplace: {0}")]
    ForeignHost(String),
}

/// Result type alias for Listing-Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{CategoryDict, ChangeRecord, FieldValue, Listing, TrackedField};
pub use reconcile::{CategoryOutcome, Reconciler};
