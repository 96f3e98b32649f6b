//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the listing database.
//! The base and sold tables share the listing column layout; `url` is unique
//! only in the sold table, since the base table may hold several stored
//! versions of the same listing.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track tracking sessions
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Active listings
CREATE TABLE IF NOT EXISTS base_listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    category_num INTEGER NOT NULL,
    category TEXT,
    ad_title TEXT NOT NULL,
    description TEXT NOT NULL,
    price REAL,
    currency TEXT,
    location TEXT,
    condition TEXT,
    frame_size TEXT,
    wheel_size TEXT,
    material TEXT,
    original_post_date TEXT,
    last_repost_date TEXT NOT NULL,
    still_for_sale TEXT NOT NULL,
    view_count REAL,
    watch_count REAL,
    datetime_scraped TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_base_url ON base_listings(url);
CREATE INDEX IF NOT EXISTS idx_base_category ON base_listings(category_num);

-- Listings confirmed sold
CREATE TABLE IF NOT EXISTS sold_listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    category_num INTEGER NOT NULL,
    category TEXT,
    ad_title TEXT NOT NULL,
    description TEXT NOT NULL,
    price REAL,
    currency TEXT,
    location TEXT,
    condition TEXT,
    frame_size TEXT,
    wheel_size TEXT,
    material TEXT,
    original_post_date TEXT,
    last_repost_date TEXT NOT NULL,
    still_for_sale TEXT NOT NULL,
    view_count REAL,
    watch_count REAL,
    datetime_scraped TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sold_category ON sold_listings(category_num);

-- Field-level change log; values keep their native type
CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    field TEXT NOT NULL,
    old_value,
    new_value,
    category_num INTEGER NOT NULL,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_changes_url ON changes(url);
CREATE INDEX IF NOT EXISTS idx_changes_category ON changes(category_num);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "base_listings", "sold_listings", "changes"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_sold_url_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT INTO sold_listings
            (url, category_num, ad_title, description, last_repost_date, still_for_sale, datetime_scraped)
            VALUES ('u', 2, 't', 'd', '2023-10-01 00:00:00', 'SOLD', '2023-10-14T08:00:00Z')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
