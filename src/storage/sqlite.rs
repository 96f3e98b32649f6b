//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the DatasetStore
//! trait. Listing dates are stored as text: `datetime_scraped` as RFC 3339,
//! marketplace dates as `YYYY-MM-DD HH:MM:SS`.

use crate::model::{ChangeRecord, FieldValue, Listing, TrackedField};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DatasetStore, StorageError, StorageResult, ALL_CATEGORIES};
use crate::storage::{
    CategoryCounts, CategoryWrite, DataType, ListingColumn, RunRecord, RunStatus,
};
use crate::TrackerError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const LISTING_COLUMNS: &str = "url, category_num, category, ad_title, description, price, \
    currency, location, condition, frame_size, wheel_size, material, original_post_date, \
    last_repost_date, still_for_sale, view_count, watch_count, datetime_scraped";

const MARKET_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite dataset backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(TrackerError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, TrackerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, TrackerError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn count_by_category(&self, table: &str) -> StorageResult<Vec<(i64, u64)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT category_num, COUNT(*) FROM {} GROUP BY category_num",
            table
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn format_scraped(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn format_market_date(dt: &NaiveDateTime) -> String {
    dt.format(MARKET_DATE_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn scraped_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn market_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDateTime::parse_from_str(&s, MARKET_DATE_FORMAT))
        .transpose()
        .map_err(|e| conversion_error(idx, e))
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let last_repost_date = market_date(row, 13)?.ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(13, "last_repost_date".to_string(), Type::Null)
    })?;

    Ok(Listing {
        url: row.get(0)?,
        category_num: row.get(1)?,
        category: row.get(2)?,
        ad_title: row.get(3)?,
        description: row.get(4)?,
        price: row.get(5)?,
        currency: row.get(6)?,
        location: row.get(7)?,
        condition: row.get(8)?,
        frame_size: row.get(9)?,
        wheel_size: row.get(10)?,
        material: row.get(11)?,
        original_post_date: market_date(row, 12)?,
        last_repost_date,
        still_for_sale: row.get(14)?,
        view_count: row.get(15)?,
        watch_count: row.get(16)?,
        datetime_scraped: scraped_at(row, 17)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

fn column_value(column: ListingColumn, listing: &Listing) -> Value {
    match column {
        ListingColumn::Tracked(field) => match field.value_of(listing) {
            FieldValue::Text(s) => Value::Text(s),
            FieldValue::Number(n) => Value::Real(n),
            FieldValue::Missing => Value::Null,
        },
        ListingColumn::CategoryNum => Value::Integer(listing.category_num),
        ListingColumn::DatetimeScraped => Value::Text(format_scraped(&listing.datetime_scraped)),
        ListingColumn::LastRepostDate => Value::Text(format_market_date(&listing.last_repost_date)),
    }
}

fn insert_listings(conn: &Connection, records: &[Listing], data_type: DataType) -> StorageResult<usize> {
    let verb = match data_type {
        DataType::Base => "INSERT",
        DataType::Sold => "INSERT OR IGNORE",
    };
    let mut stmt = conn.prepare(&format!(
        "{} INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        verb,
        data_type.table(),
        LISTING_COLUMNS
    ))?;

    let mut written = 0;
    for l in records {
        written += stmt.execute(params![
            l.url,
            l.category_num,
            l.category,
            l.ad_title,
            l.description,
            l.price,
            l.currency,
            l.location,
            l.condition,
            l.frame_size,
            l.wheel_size,
            l.material,
            l.original_post_date.as_ref().map(format_market_date),
            format_market_date(&l.last_repost_date),
            l.still_for_sale,
            l.view_count,
            l.watch_count,
            format_scraped(&l.datetime_scraped),
        ])?;
    }
    Ok(written)
}

fn update_base_rows(
    conn: &Connection,
    records: &[Listing],
    cols_to_update: &[ListingColumn],
) -> StorageResult<usize> {
    if cols_to_update.is_empty() || records.is_empty() {
        return Ok(0);
    }

    let assignments = cols_to_update
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col.as_str(), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "UPDATE base_listings SET {} WHERE url = ?{}",
        assignments,
        cols_to_update.len() + 1
    ))?;

    let mut touched = 0;
    for record in records {
        let mut values: Vec<Value> = cols_to_update
            .iter()
            .map(|col| column_value(*col, record))
            .collect();
        values.push(Value::Text(record.url.clone()));
        touched += stmt.execute(params_from_iter(values))?;
    }
    Ok(touched)
}

fn delete_urls(conn: &Connection, data_type: DataType, urls: &[String]) -> StorageResult<usize> {
    let mut stmt = conn.prepare(&format!("DELETE FROM {} WHERE url = ?1", data_type.table()))?;
    let mut removed = 0;
    for url in urls {
        removed += stmt.execute(params![url])?;
    }
    Ok(removed)
}

fn insert_changes(conn: &Connection, records: &[ChangeRecord]) -> StorageResult<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO changes (url, field, old_value, new_value, category_num, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut written = 0;
    for record in records {
        written += stmt.execute(params![
            record.url,
            record.field.as_str(),
            record.old_value,
            record.new_value,
            record.category_num,
            format_scraped(&record.detected_at),
        ])?;
    }
    Ok(written)
}

impl DatasetStore for SqliteStore {
    // ===== Listing datasets =====

    fn get_dataset(&self, category_num: i64, data_type: DataType) -> StorageResult<Vec<Listing>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE (?1 = ?2 OR category_num = ?1) ORDER BY id",
            LISTING_COLUMNS,
            data_type.table()
        ))?;

        let listings = stmt
            .query_map(params![category_num, ALL_CATEGORIES], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }

    fn write_dataset(&mut self, records: &[Listing], data_type: DataType) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let written = insert_listings(&tx, records, data_type)?;
        tx.commit()?;
        Ok(written)
    }

    fn update_base_data(
        &mut self,
        records: &[Listing],
        cols_to_update: &[ListingColumn],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let touched = update_base_rows(&tx, records, cols_to_update)?;
        tx.commit()?;
        Ok(touched)
    }

    fn remove_from_base_data(&mut self, urls: &[String]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let removed = delete_urls(&tx, DataType::Base, urls)?;
        tx.commit()?;
        Ok(removed)
    }

    fn remove_from_sold_data(&mut self, urls: &[String]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let removed = delete_urls(&tx, DataType::Sold, urls)?;
        tx.commit()?;
        Ok(removed)
    }

    // ===== Change log =====

    fn get_changes(&self, category_num: i64) -> StorageResult<Vec<ChangeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, field, old_value, new_value, category_num, detected_at
             FROM changes WHERE (?1 = ?2 OR category_num = ?1) ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![category_num, ALL_CATEGORIES], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, FieldValue>(2)?,
                    row.get::<_, FieldValue>(3)?,
                    row.get::<_, i64>(4)?,
                    scraped_at(row, 5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(url, field, old_value, new_value, category_num, detected_at)| {
                let field = TrackedField::from_db_string(&field).ok_or_else(|| {
                    StorageError::InvalidRecord(format!("unknown change field {}", field))
                })?;
                Ok(ChangeRecord {
                    url,
                    field,
                    old_value,
                    new_value,
                    category_num,
                    detected_at,
                })
            })
            .collect()
    }

    fn write_changes(&mut self, records: &[ChangeRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let written = insert_changes(&tx, records)?;
        tx.commit()?;
        Ok(written)
    }

    // ===== Category writes =====

    fn apply_category(&mut self, write: &CategoryWrite) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        insert_changes(&tx, &write.changes)?;
        update_base_rows(&tx, &write.updated, &write.update_columns)?;
        insert_listings(&tx, &write.new_base, DataType::Base)?;
        delete_urls(&tx, DataType::Sold, &write.sold_removals)?;
        insert_listings(&tx, &write.sold, DataType::Sold)?;
        delete_urls(&tx, DataType::Base, &write.base_removals)?;
        tx.commit()?;
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        finish_run(&self.conn, run_id, RunStatus::Completed)
    }

    fn fail_run(&mut self, run_id: i64) -> StorageResult<()> {
        finish_run(&self.conn, run_id, RunStatus::Failed)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    // ===== Statistics =====

    fn dataset_counts(&self) -> StorageResult<Vec<CategoryCounts>> {
        let mut by_category: BTreeMap<i64, CategoryCounts> = BTreeMap::new();

        for (category_num, count) in self.count_by_category(DataType::Base.table())? {
            counts_for(&mut by_category, category_num).base = count;
        }
        for (category_num, count) in self.count_by_category(DataType::Sold.table())? {
            counts_for(&mut by_category, category_num).sold = count;
        }
        for (category_num, count) in self.count_by_category("changes")? {
            counts_for(&mut by_category, category_num).changes = count;
        }

        Ok(by_category.into_values().collect())
    }
}

fn counts_for(by_category: &mut BTreeMap<i64, CategoryCounts>, category_num: i64) -> &mut CategoryCounts {
    by_category.entry(category_num).or_insert(CategoryCounts {
        category_num,
        ..Default::default()
    })
}

fn finish_run(conn: &Connection, run_id: i64, status: RunStatus) -> StorageResult<()> {
    let now = Utc::now().to_rfc3339();
    let updated = conn.execute(
        "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
        params![status.to_db_string(), now, run_id],
    )?;
    if updated == 0 {
        return Err(StorageError::RunNotFound(run_id));
    }
    Ok(())
}
