//! Output module for reporting on stored crawl data

pub mod stats;

pub use stats::{load_statistics, load_statistics_on, print_statistics, CrawlStatistics};
