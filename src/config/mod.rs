//! Configuration module for Listing-Tracker
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use listing_tracker::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tracker.toml")).unwrap();
//! println!("Index pages fetched {} at a time", config.scraper.concurrency);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, OutputConfig, ScraperConfig, SourceConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
