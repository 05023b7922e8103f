//! Crawler module for marketplace catalog ingestion
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with identity headers and bounded timeout retry
//! - Category tree synchronization
//! - Paginated listing walks per leaf category
//! - Batched item detail lookups feeding the snapshot store
//! - Overall crawl orchestration

mod categories;
mod coordinator;
mod details;
mod fetcher;
mod listing;

pub use categories::CategorySync;
pub use coordinator::{run_crawl, CrawlOrchestrator, CrawlPhase, CrawlSummary};
pub use details::{BatchOutcome, DetailBatcher};
pub use fetcher::{build_http_client, default_referer, generate_identity, Fetcher};
pub use listing::{ListingCursor, ListingWalker, WalkSettings, WalkSummary};
