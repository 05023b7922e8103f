//! Statistics generation from a market store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::{ingestion_date, RunRecord, Storage, StorageResult};
use chrono::{NaiveDate, Utc};

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of categories stored
    pub categories: u64,

    /// Categories eligible for listing walks
    pub leaf_categories: u64,

    /// Distinct items ever seen
    pub items: u64,

    /// Snapshots across all items and dates
    pub snapshots: u64,

    /// Date the daily count below refers to
    pub date: NaiveDate,

    /// Snapshots captured on `date`
    pub snapshots_on_date: u64,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage, counting today's snapshots
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    load_statistics_on(storage, ingestion_date(Utc::now()))
}

/// Loads statistics from storage, counting the snapshots of `date`
pub fn load_statistics_on(storage: &dyn Storage, date: NaiveDate) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        categories: storage.count_categories()?,
        leaf_categories: storage.load_leaf_categories()?.len() as u64,
        items: storage.count_items()?,
        snapshots: storage.count_snapshots()?,
        date,
        snapshots_on_date: storage.count_snapshots_on(date)?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Categories:");
    println!("  Total: {}", stats.categories);
    println!("  Leaf: {}", stats.leaf_categories);
    println!();

    println!("Items:");
    println!("  Known items: {}", stats.items);
    println!("  Snapshots: {}", stats.snapshots);
    println!("  Snapshots on {}: {}", stats.date, stats.snapshots_on_date);

    let coverage = if stats.items > 0 {
        (stats.snapshots_on_date as f64 / stats.items as f64) * 100.0
    } else {
        0.0
    };
    println!("  Daily coverage: {:.1}%", coverage);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No crawl runs recorded"),
    }
}
