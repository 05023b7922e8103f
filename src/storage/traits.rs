//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::market::{Attributes, CategoryNode};
use crate::storage::{ItemRecord, RunRecord, RunStatus};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date in store: {0}")]
    InvalidDate(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method is a single statement against the backend; callers compose
/// multi-step updates and accept that they are not atomic.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run for `market` and returns its id
    fn create_run(&mut self, market: &str, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Stamps the finish time and final status of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Categories =====

    /// Inserts or replaces a category keyed by its `cat_id`
    fn upsert_category(&mut self, node: &CategoryNode) -> StorageResult<()>;

    /// All persisted categories ordered by id
    fn load_categories(&self) -> StorageResult<Vec<CategoryNode>>;

    /// Persisted categories with a nonzero parent, ordered by id
    fn load_leaf_categories(&self) -> StorageResult<Vec<CategoryNode>>;

    // ===== Items =====

    /// Upserts the identity row of an item, setting its `mtime`
    fn touch_item(&mut self, item_id: i64, mtime: i64) -> StorageResult<()>;

    /// Whether a snapshot of `item_id` already exists for `date`
    fn has_snapshot(&self, item_id: i64, date: NaiveDate) -> StorageResult<bool>;

    /// Appends a dated snapshot to the item's history
    ///
    /// Returns `false` when a snapshot for that date was already present.
    fn append_snapshot(
        &mut self,
        item_id: i64,
        date: NaiveDate,
        attributes: &Attributes,
    ) -> StorageResult<bool>;

    /// Loads an item with its full history
    fn get_item(&self, item_id: i64) -> StorageResult<Option<ItemRecord>>;

    /// Ids of every known item, ascending
    fn list_item_ids(&self) -> StorageResult<Vec<i64>>;

    // ===== Statistics =====

    fn count_categories(&self) -> StorageResult<u64>;

    fn count_items(&self) -> StorageResult<u64>;

    fn count_snapshots(&self) -> StorageResult<u64>;

    /// Snapshots captured on `date`
    fn count_snapshots_on(&self, date: NaiveDate) -> StorageResult<u64>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
