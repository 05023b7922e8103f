//! Database schema definitions
//!
//! This module contains all SQL schema definitions for a market's database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    market TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Category tree, refreshed in place; stale nodes are kept
CREATE TABLE IF NOT EXISTS categories (
    cat_id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL,
    parent_id INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories(parent_id);

-- Item identity, touched on every sighting
CREATE TABLE IF NOT EXISTS items (
    item_id INTEGER PRIMARY KEY,
    mtime INTEGER NOT NULL
);

-- Append-only history, at most one snapshot per item and day
CREATE TABLE IF NOT EXISTS item_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(item_id),
    ingestion_date TEXT NOT NULL,
    attributes TEXT NOT NULL,
    UNIQUE(item_id, ingestion_date)
);

CREATE INDEX IF NOT EXISTS idx_item_snapshots_date ON item_snapshots(ingestion_date);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
