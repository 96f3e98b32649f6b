//! URL handling module for Listing-Tracker
//!
//! This module builds the marketplace's index page addresses and resolves
//! listing links found on those pages into their identity form.

mod normalize;

use crate::config::SourceConfig;
use crate::{UrlError, UrlResult};
use url::Url;

pub use normalize::normalize_listing_url;

/// Addresses on the tracked marketplace
#[derive(Debug, Clone)]
pub struct MarketplaceUrls {
    base: Url,
    region: u32,
}

impl MarketplaceUrls {
    /// Creates the address book for a marketplace root
    ///
    /// # Arguments
    ///
    /// * `base_url` - Site root, e.g. "https://www.pinkbike.com"
    /// * `region` - Region filter passed to every index page
    pub fn new(base_url: &str, region: u32) -> UrlResult<Self> {
        let base = Url::parse(base_url)?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(base.scheme().to_string()));
        }
        Ok(Self { base, region })
    }

    pub fn from_config(config: &SourceConfig) -> UrlResult<Self> {
        Self::new(&config.base_url, config.region)
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// One listing index page of a category
    ///
    /// ```
    /// use listing_tracker::url::MarketplaceUrls;
    ///
    /// let urls = MarketplaceUrls::new("https://www.pinkbike.com", 3).unwrap();
    /// assert_eq!(
    ///     urls.index_page(2, 5).as_str(),
    ///     "https://www.pinkbike.com/buysell/list/?region=3&page=5&category=2"
    /// );
    /// ```
    pub fn index_page(&self, category_num: i64, page: u32) -> Url {
        let mut url = self.base.join("/buysell/list/").unwrap_or_else(|_| self.base.clone());
        url.query_pairs_mut()
            .append_pair("region", &self.region.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("category", &category_num.to_string());
        url
    }

    pub fn robots_txt(&self) -> Url {
        self.base.join("/robots.txt").unwrap_or_else(|_| self.base.clone())
    }

    /// Resolves a link from an index page into a listing identity URL
    ///
    /// Relative links resolve against the marketplace root. Links to other
    /// hosts are rejected.
    pub fn resolve_listing(&self, href: &str) -> UrlResult<String> {
        let url = self.base.join(href.trim())?;

        if url.host_str() != self.base.host_str() {
            return Err(UrlError::ForeignHost(url.to_string()));
        }

        Ok(normalize_listing_url(url))
    }
}
