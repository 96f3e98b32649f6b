//! Tracked fields and field-level change records

use crate::model::Listing;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields compared between two versions of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackedField {
    Price,
    Description,
    AdTitle,
    Category,
    Currency,
}

impl TrackedField {
    /// The full compared set, in change-log order
    pub const ALL: [TrackedField; 5] = [
        TrackedField::Price,
        TrackedField::Description,
        TrackedField::AdTitle,
        TrackedField::Category,
        TrackedField::Currency,
    ];

    /// Column name used in the datasets
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Description => "description",
            Self::AdTitle => "ad_title",
            Self::Category => "category",
            Self::Currency => "currency",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == s)
    }

    /// Reads this field out of a listing
    pub fn value_of(&self, listing: &Listing) -> FieldValue {
        match self {
            Self::Price => listing.price.into(),
            Self::Description => FieldValue::Text(listing.description.clone()),
            Self::AdTitle => FieldValue::Text(listing.ad_title.clone()),
            Self::Category => listing.category.clone().into(),
            Self::Currency => listing.currency.clone().into(),
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of a tracked field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Missing,
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Number)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Text)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Missing => f.write_str("<missing>"),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Number(n) => ToSqlOutput::Owned(Value::Real(*n)),
            Self::Missing => ToSqlOutput::Owned(Value::Null),
        })
    }
}

impl FromSql for FieldValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Self::Missing),
            ValueRef::Integer(i) => Ok(Self::Number(i as f64)),
            ValueRef::Real(n) => Ok(Self::Number(n)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Self::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// One field-level difference between two versions of a listing
///
/// Append-only: records are never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub url: String,
    pub field: TrackedField,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub category_num: i64,
    pub detected_at: DateTime<Utc>,
}
