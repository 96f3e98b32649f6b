//! Robots.txt handling module
//!
//! The marketplace's robots.txt is fetched once per session. Every fetch goes
//! through the resulting policy, and its Crawl-delay raises the configured
//! per-request delay when it is longer.

mod parser;

pub use parser::RobotsPolicy;

use crate::url::MarketplaceUrls;
use reqwest::Client;

/// Fetches and parses the marketplace's robots.txt
///
/// A missing robots.txt (4xx) allows everything. Network errors and server
/// errors also fall back to allow-all, with a warning, so a flaky robots.txt
/// does not stop a session.
pub async fn fetch_robots(client: &Client, urls: &MarketplaceUrls, agent: &str) -> RobotsPolicy {
    let robots_url = urls.robots_txt();

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Could not fetch {}: {}; allowing all", robots_url, e);
            return RobotsPolicy::allow_all();
        }
    };

    let status = response.status();
    if status.is_client_error() {
        tracing::debug!("No robots.txt at {} (HTTP {})", robots_url, status.as_u16());
        return RobotsPolicy::allow_all();
    }
    if !status.is_success() {
        tracing::warn!(
            "robots.txt at {} returned HTTP {}; allowing all",
            robots_url,
            status.as_u16()
        );
        return RobotsPolicy::allow_all();
    }

    match response.text().await {
        Ok(content) => RobotsPolicy::from_content(&content, agent),
        Err(e) => {
            tracing::warn!("Could not read {}: {}; allowing all", robots_url, e);
            RobotsPolicy::allow_all()
        }
    }
}
