use crate::market::MarketKind;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Directory holding one SQLite database per market
    pub database_dir: String,

    /// Market keys to crawl, in order
    #[serde(default)]
    pub regions: Vec<String>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Market endpoints keyed by region
    #[serde(default)]
    pub markets: BTreeMap<String, MarketConfig>,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    /// Identity sent as `User-Agent` when a request carries none
    pub user_agent: String,

    /// Regenerate a plausible browser identity before every injection
    pub rotate_user_agent: bool,

    /// Retries after the first attempt when the transport times out
    pub timeout_retries: u32,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Linear backoff step between timeout retries (milliseconds), 0 disables
    pub retry_backoff_ms: u64,

    /// Keep-alive connections kept idle per host
    pub pool_max_idle_per_host: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rotate_user_agent: false,
            timeout_retries: 0,
            request_timeout_ms: 10_000,
            retry_backoff_ms: 0,
            pool_max_idle_per_host: 100,
        }
    }
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 AppleWebKit/529.86 (KHTML, like Gecko) Chrome/54.1.2280.43 Safari/533.36";

/// Listing walk behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlConfig {
    /// Items requested per listing page
    pub page_limit: u32,

    /// Retries of a failing listing page before the category is abandoned
    pub page_retries: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            page_retries: 3,
        }
    }
}

/// Endpoints of one market region
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketConfig {
    #[serde(default)]
    pub kind: MarketKind,

    pub host: String,

    pub category_url: String,

    /// Template with `{catid}`, `{offset}` and `{limit}` placeholders
    pub item_list_url: String,

    pub item_info_url: String,

    /// Pause between listing pages (milliseconds)
    #[serde(default)]
    pub sleep_interval: u64,

    /// Extra headers sent with every detail lookup
    #[serde(default)]
    pub detail_headers: BTreeMap<String, String>,
}
