//! The marketplace as seen by the crawler and the reconciliation engine
//!
//! `MarketplaceSource` is the seam between network access and the stateful
//! logic. `HttpSource` is the live implementation; tests substitute an
//! in-memory source.

use crate::crawler::fetcher::{fetch_with_retry, FetchFailure};
use crate::crawler::parser::{parse_index_page, parse_listing, parse_total_pages, IndexEntry};
use crate::model::Listing;
use crate::robots::RobotsPolicy;
use crate::url::MarketplaceUrls;
use crate::TrackerError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;

/// Index and detail pages of one marketplace
#[async_trait]
pub trait MarketplaceSource: Send + Sync {
    /// Number of index pages of a category; 0 when it has no listings
    async fn total_pages(&self, category_num: i64) -> Result<u32, TrackerError>;

    /// Listing links of one index page, in page order
    async fn index_page(
        &self,
        category_num: i64,
        page: u32,
        delay: Duration,
    ) -> Result<Vec<IndexEntry>, FetchFailure>;

    /// Fetches and parses one listing
    ///
    /// `None` means the listing is currently unavailable: delisted, not
    /// parseable, or not fetchable.
    async fn listing(&self, url: &str, category_num: i64, delay: Duration) -> Option<Listing>;
}

/// `MarketplaceSource` over HTTP
pub struct HttpSource {
    client: Client,
    robots: RobotsPolicy,
    urls: MarketplaceUrls,
    retries: u32,
    min_delay: Duration,
}

impl HttpSource {
    /// Creates a source over a session's client and robots policy
    ///
    /// A Crawl-delay in the robots policy becomes the lower bound of every
    /// request delay.
    pub fn new(client: Client, robots: RobotsPolicy, urls: MarketplaceUrls, retries: u32) -> Self {
        let min_delay = robots.crawl_delay().unwrap_or(Duration::ZERO);
        if !min_delay.is_zero() {
            tracing::info!("robots.txt asks for a crawl delay of {:?}", min_delay);
        }

        Self {
            client,
            robots,
            urls,
            retries,
            min_delay,
        }
    }

    pub fn urls(&self) -> &MarketplaceUrls {
        &self.urls
    }

    fn effective_delay(&self, delay: Duration) -> Duration {
        delay.max(self.min_delay)
    }
}

#[async_trait]
impl MarketplaceSource for HttpSource {
    async fn total_pages(&self, category_num: i64) -> Result<u32, TrackerError> {
        let url = self.urls.index_page(category_num, 1);
        let page = fetch_with_retry(
            &self.client,
            &self.robots,
            url.as_str(),
            self.min_delay,
            self.retries,
        )
        .await
        .map_err(|failure| TrackerError::Fetch {
            url: url.to_string(),
            failure,
        })?;

        Ok(parse_total_pages(&page.body, &self.urls))
    }

    async fn index_page(
        &self,
        category_num: i64,
        page: u32,
        delay: Duration,
    ) -> Result<Vec<IndexEntry>, FetchFailure> {
        let url = self.urls.index_page(category_num, page);
        let raw = fetch_with_retry(
            &self.client,
            &self.robots,
            url.as_str(),
            self.effective_delay(delay),
            self.retries,
        )
        .await?;

        Ok(parse_index_page(&raw.body, &self.urls))
    }

    async fn listing(&self, url: &str, category_num: i64, delay: Duration) -> Option<Listing> {
        let raw = match fetch_with_retry(
            &self.client,
            &self.robots,
            url,
            self.effective_delay(delay),
            self.retries,
        )
        .await
        {
            Ok(raw) => raw,
            Err(failure) => {
                tracing::debug!("Listing {} unavailable: {}", url, failure);
                return None;
            }
        };

        let listing = parse_listing(&raw.body, url, category_num, Utc::now());
        if listing.is_none() {
            tracing::debug!("Listing {} could not be parsed", url);
        }
        listing
    }
}
