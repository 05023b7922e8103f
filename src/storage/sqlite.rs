//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::market::{Attributes, CategoryNode};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ItemRecord, ItemSnapshot, RunRecord, RunStatus};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| StorageError::InvalidDate(value.to_string()))
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryNode> {
    Ok(CategoryNode {
        cat_id: row.get(0)?,
        display_name: row.get(1)?,
        parent_id: row.get(2)?,
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

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, market: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (market, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![market, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Categories =====

    fn upsert_category(&mut self, node: &CategoryNode) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO categories (cat_id, display_name, parent_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(cat_id) DO UPDATE SET
                display_name = excluded.display_name,
                parent_id = excluded.parent_id",
            params![node.cat_id, node.display_name, node.parent_id],
        )?;
        Ok(())
    }

    fn load_categories(&self) -> StorageResult<Vec<CategoryNode>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cat_id, display_name, parent_id FROM categories ORDER BY cat_id")?;
        let nodes = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    fn load_leaf_categories(&self) -> StorageResult<Vec<CategoryNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT cat_id, display_name, parent_id FROM categories
             WHERE parent_id != 0 ORDER BY cat_id",
        )?;
        let nodes = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    // ===== Items =====

    fn touch_item(&mut self, item_id: i64, mtime: i64) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO items (item_id, mtime) VALUES (?1, ?2)
             ON CONFLICT(item_id) DO UPDATE SET mtime = excluded.mtime",
            params![item_id, mtime],
        )?;
        Ok(())
    }

    fn has_snapshot(&self, item_id: i64, date: NaiveDate) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM item_snapshots WHERE item_id = ?1 AND ingestion_date = ?2",
                params![item_id, format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn append_snapshot(
        &mut self,
        item_id: i64,
        date: NaiveDate,
        attributes: &Attributes,
    ) -> StorageResult<bool> {
        let encoded = serde_json::to_string(attributes)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO item_snapshots (item_id, ingestion_date, attributes)
             VALUES (?1, ?2, ?3)",
            params![item_id, format_date(date), encoded],
        )?;
        Ok(inserted > 0)
    }

    fn get_item(&self, item_id: i64) -> StorageResult<Option<ItemRecord>> {
        let mtime: Option<i64> = self
            .conn
            .query_row(
                "SELECT mtime FROM items WHERE item_id = ?1",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(mtime) = mtime else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT ingestion_date, attributes FROM item_snapshots
             WHERE item_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![item_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut history = Vec::with_capacity(rows.len());
        for (date, attributes) in rows {
            history.push(ItemSnapshot {
                ingestion_date: parse_date(&date)?,
                attributes: serde_json::from_str(&attributes)?,
            });
        }

        Ok(Some(ItemRecord {
            item_id,
            mtime,
            history,
        }))
    }

    fn list_item_ids(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT item_id FROM items ORDER BY item_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ===== Statistics =====

    fn count_categories(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_snapshots(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM item_snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_snapshots_on(&self, date: NaiveDate) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM item_snapshots WHERE ingestion_date = ?1",
            params![format_date(date)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}
