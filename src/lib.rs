//! Crawlee: an incremental marketplace catalog crawler
//!
//! This crate walks a marketplace's category tree, paginates item listings per
//! leaf category, resolves item details in batches, and keeps a dated snapshot
//! history per item in a local SQLite store.

pub mod config;
pub mod crawler;
pub mod market;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request timeout for {url}")]
    Timeout { url: String, source: reqwest::Error },

    #[error("Response status {status} not 200 for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        source: serde_json::Error,
    },

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Listing page for category {cat_id} at offset {offset} failed after {attempts} attempts: {last}")]
    PageRetriesExhausted {
        cat_id: i64,
        offset: u32,
        attempts: u32,
        last: Box<CrawlError>,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl CrawlError {
    /// Only transport timeouts are worth repeating the identical request for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOrchestrator, Fetcher};
pub use market::{CategoryNode, ItemRef, Market, MarketKind};
