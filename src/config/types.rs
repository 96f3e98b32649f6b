use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Listing-Tracker
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    /// Category name to category number, as assigned by the marketplace
    #[serde(default)]
    pub categories: BTreeMap<String, i64>,
}

/// Scrape session behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Delay before every page request (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Number of index pages fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Ignore the last scrape date and check every listing
    #[serde(rename = "full-refresh", default)]
    pub full_refresh: bool,

    /// Explicit subset of category numbers; the full configured number range otherwise
    #[serde(rename = "categories-to-scrape", default)]
    pub categories_to_scrape: Option<Vec<i64>>,

    /// Retries for transient fetch failures (5xx, 429, timeouts)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Non-boosted listings checked past the early-termination point (0 disables)
    #[serde(rename = "ordering-check", default)]
    pub ordering_check: usize,
}

impl ScraperConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            concurrency: default_concurrency(),
            full_refresh: false,
            categories_to_scrape: None,
            max_retries: default_max_retries(),
            ordering_check: 0,
        }
    }
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    2
}

/// Marketplace being tracked
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Site root, e.g. "https://www.pinkbike.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Region filter passed to the listing index
    #[serde(default = "default_region")]
    pub region: u32,

    /// Check robots.txt before fetching
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

fn default_region() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
