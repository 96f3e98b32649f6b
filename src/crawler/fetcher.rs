//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the session's HTTP client with a proper user agent string
//! - Applying the per-request politeness delay
//! - Checking the robots.txt policy
//! - Validating that the response is a usable HTML page
//! - Retrying transient failures for callers that want it

use crate::config::UserAgentConfig;
use crate::robots::RobotsPolicy;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;

/// A page fetched successfully
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Final URL after redirects
    pub final_url: String,
    /// Page body content
    pub body: String,
}

/// Why a page could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("disallowed by robots.txt")]
    Disallowed,

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("expected HTML, got {content_type}")]
    ContentMismatch { content_type: String },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("empty response body")]
    EmptyBody,
}

impl FetchFailure {
    /// Failures worth retrying: server errors and transport problems
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use listing_tracker::config::UserAgentConfig;
/// use listing_tracker::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "ListingTracker".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one page after waiting `delay`
///
/// The delay is applied by every call on its own; concurrent callers do not
/// queue behind each other.
///
/// # Failure Mapping
///
/// | Condition | Result |
/// |-----------|--------|
/// | Disallowed by robots.txt | `Disallowed`, no request sent |
/// | Non-2xx status | `Status` |
/// | Content-Type present and not HTML | `ContentMismatch` |
/// | Timeout | `Timeout` |
/// | Connection or body read error | `Network` |
/// | Blank body | `EmptyBody` |
pub async fn fetch(
    client: &Client,
    robots: &RobotsPolicy,
    url: &str,
    delay: Duration,
) -> Result<RawPage, FetchFailure> {
    if !robots.is_allowed(url) {
        return Err(FetchFailure::Disallowed);
    }

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let response = client.get(url).send().await.map_err(classify_error)?;
    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return Err(FetchFailure::Status {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.is_empty() && !content_type.contains("text/html") {
        return Err(FetchFailure::ContentMismatch { content_type });
    }

    let body = response.text().await.map_err(classify_error)?;
    if body.trim().is_empty() {
        return Err(FetchFailure::EmptyBody);
    }

    Ok(RawPage { final_url, body })
}

/// Fetches a page, retrying transient failures up to `retries` extra times
///
/// Each attempt waits `delay` again before its request.
pub async fn fetch_with_retry(
    client: &Client,
    robots: &RobotsPolicy,
    url: &str,
    delay: Duration,
    retries: u32,
) -> Result<RawPage, FetchFailure> {
    let mut attempt = 0;
    loop {
        match fetch(client, robots, url, delay).await {
            Err(failure) if failure.is_transient() && attempt < retries => {
                attempt += 1;
                tracing::debug!(
                    "Retrying {} after {} (attempt {}/{})",
                    url,
                    failure,
                    attempt,
                    retries
                );
            }
            result => return result,
        }
    }
}

fn classify_error(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_connect() {
        FetchFailure::Network("connection refused".to_string())
    } else {
        FetchFailure::Network(e.to_string())
    }
}
