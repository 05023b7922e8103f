//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use crawlee::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawlee.toml")).unwrap();
//! println!("Crawling regions: {:?}", config.regions);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlConfig, FetchConfig, MarketConfig, DEFAULT_USER_AGENT};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
