//! In-memory marketplace for unit tests

use crate::crawler::fetcher::FetchFailure;
use crate::crawler::parser::IndexEntry;
use crate::crawler::source::MarketplaceSource;
use crate::model::Listing;
use crate::TrackerError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct FakeSource {
    index: HashMap<i64, Vec<Vec<IndexEntry>>>,
    failing_pages: HashSet<(i64, u32)>,
    listings: HashMap<String, Listing>,
    requested: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index pages of a category; page numbers start at 1
    pub fn with_index(mut self, category_num: i64, pages: Vec<Vec<IndexEntry>>) -> Self {
        self.index.insert(category_num, pages);
        self
    }

    pub fn with_failing_page(mut self, category_num: i64, page: u32) -> Self {
        self.failing_pages.insert((category_num, page));
        self
    }

    /// A detail page that parses to `listing`
    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listings.insert(listing.url.clone(), listing);
        self
    }

    /// Urls whose detail page was requested, in request order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketplaceSource for FakeSource {
    async fn total_pages(&self, category_num: i64) -> Result<u32, TrackerError> {
        self.index
            .get(&category_num)
            .map(|pages| pages.len() as u32)
            .ok_or(TrackerError::Category {
                category_num,
                message: "no such category".to_string(),
            })
    }

    async fn index_page(
        &self,
        category_num: i64,
        page: u32,
        _delay: Duration,
    ) -> Result<Vec<IndexEntry>, FetchFailure> {
        if self.failing_pages.contains(&(category_num, page)) {
            return Err(FetchFailure::Status { status: 503 });
        }
        self.index
            .get(&category_num)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .ok_or(FetchFailure::Status { status: 404 })
    }

    async fn listing(&self, url: &str, _category_num: i64, _delay: Duration) -> Option<Listing> {
        self.requested.lock().unwrap().push(url.to_string());
        self.listings.get(url).cloned()
    }
}
