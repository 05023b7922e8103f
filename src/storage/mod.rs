//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Category upserts keyed by category id
//! - Item identity rows and their dated snapshot history
//! - Run tracking

mod schema;
mod snapshot;
mod sqlite;
mod traits;

pub use snapshot::{ingestion_date, SnapshotStore};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::market::Attributes;
use chrono::NaiveDate;

/// One dated capture of an item's attributes
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub ingestion_date: NaiveDate,
    pub attributes: Attributes,
}

/// An item's identity row together with its snapshot history
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub item_id: i64,
    /// Unix seconds of the most recent sighting
    pub mtime: i64,
    /// Oldest first
    pub history: Vec<ItemSnapshot>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
