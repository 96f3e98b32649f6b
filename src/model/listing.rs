//! Listing record and the coercion rules applied at the parser boundary

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One marketplace ad, identified by its url
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Identity key, stable for the listing's whole lifecycle
    pub url: String,

    /// Category number assigned by the marketplace
    pub category_num: i64,

    /// Category label shown on the detail page
    pub category: Option<String>,

    pub ad_title: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub location: Option<String>,
    pub condition: Option<String>,
    pub frame_size: Option<String>,
    pub wheel_size: Option<String>,
    pub material: Option<String>,
    pub original_post_date: Option<NaiveDateTime>,

    /// Last time the seller bumped the ad; the recency signal for index ordering
    pub last_repost_date: NaiveDateTime,

    /// Free-text status, contains "sold" once sold
    pub still_for_sale: String,

    pub view_count: Option<f64>,
    pub watch_count: Option<f64>,

    /// Assigned by this system when the detail page was parsed
    pub datetime_scraped: DateTime<Utc>,
}

impl Listing {
    /// Whether the status text marks the listing as sold
    pub fn is_sold(&self) -> bool {
        self.still_for_sale.to_lowercase().contains("sold")
    }

    /// The repost date truncated to a calendar day
    ///
    /// The marketplace shows repost times without AM/PM, so only the day is
    /// trustworthy when comparing against the previous scrape.
    pub fn repost_day(&self) -> NaiveDate {
        self.last_repost_date.date()
    }

    /// At least one numeric field survived coercion
    pub fn has_numeric_fields(&self) -> bool {
        self.price.is_some() || self.watch_count.is_some() || self.view_count.is_some()
    }
}

/// Date used as the scrape boundary when nothing has been scraped yet
pub fn epoch_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Normalizes a numeric field that arrives as display text
///
/// Currency symbols, thousands separators, and unit words are stripped.
/// Returns `None` when nothing parseable remains.
///
/// ```
/// use listing_tracker::model::coerce_number;
///
/// assert_eq!(coerce_number("$1,500 CAD"), Some(1500.0));
/// assert_eq!(coerce_number("12 watchers"), Some(12.0));
/// assert_eq!(coerce_number("n/a"), None);
/// ```
pub fn coerce_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATETIME_FORMATS: &[&str] = &[
    "%b-%d-%Y %H:%M:%S",
    "%b-%d-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%b-%d-%Y", "%Y-%m-%d", "%d-%b-%Y"];

/// Parses the date formats the marketplace displays
///
/// Date-only values resolve to midnight.
pub fn parse_listing_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Splits a price display like "$1,500 CAD" into amount and currency code
pub fn split_price(raw: &str) -> (Option<f64>, Option<String>) {
    let currency = raw
        .split_whitespace()
        .rev()
        .find(|token| token.len() == 3 && token.chars().all(|c| c.is_ascii_uppercase()))
        .map(str::to_string);

    (coerce_number(raw), currency)
}
