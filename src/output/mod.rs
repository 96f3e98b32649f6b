//! Output module for session reporting
//!
//! This module handles:
//! - Counting session outcomes for progress logging
//! - Reading and printing dataset statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, DatasetStatistics, SessionStats};
