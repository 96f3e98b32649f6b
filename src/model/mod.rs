//! Domain types shared by the crawler, the reconciliation engine, and storage
//!
//! # Components
//!
//! - `Listing`: one marketplace ad with typed, coerced fields
//! - `TrackedField` / `FieldValue` / `ChangeRecord`: the field-level change log
//! - `CategoryDict`: the static category name to number mapping

mod category;
mod change;
mod listing;

pub use category::CategoryDict;
pub use change::{ChangeRecord, FieldValue, TrackedField};
pub use listing::{coerce_number, epoch_sentinel, parse_listing_date, split_price, Listing};
