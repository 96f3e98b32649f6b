//! Crawler module for the tracked marketplace
//!
//! This module contains everything that touches the site, including:
//! - HTTP fetching with politeness delay and retries
//! - Index and detail page parsing
//! - The concurrent category index crawl
//! - Session coordination across categories

mod coordinator;
#[cfg(test)]
pub(crate) mod fake;
mod fetcher;
mod pages;
mod parser;
mod source;

pub use coordinator::{run_session, Coordinator};
pub use fetcher::{build_http_client, fetch, fetch_with_retry, FetchFailure, RawPage};
pub use pages::{crawl_category, merge_pages, CategoryCrawl, CombinedUrlMap};
pub use parser::{parse_index_page, parse_listing, parse_total_pages, IndexEntry};
pub use source::{HttpSource, MarketplaceSource};
