use crate::config::types::{Config, CrawlConfig, FetchConfig, MarketConfig};
use crate::ConfigError;
use url::Url;

/// Placeholders every listing URL template must carry
pub const LISTING_PLACEHOLDERS: [&str; 3] = ["{catid}", "{offset}", "{limit}"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database_dir.is_empty() {
        return Err(ConfigError::Validation(
            "database_dir cannot be empty".to_string(),
        ));
    }

    validate_fetch_config(&config.fetch)?;
    validate_crawl_config(&config.crawl)?;

    for (region, market) in &config.markets {
        validate_market_config(region, market)?;
    }

    for region in &config.regions {
        if !config.markets.contains_key(region) {
            return Err(ConfigError::Validation(format!(
                "region '{}' has no [markets.{}] section",
                region, region
            )));
        }
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.page_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "page_limit must be >= 1, got {}",
            config.page_limit
        )));
    }

    Ok(())
}

/// Validates one market's endpoints
fn validate_market_config(region: &str, config: &MarketConfig) -> Result<(), ConfigError> {
    if region.is_empty() {
        return Err(ConfigError::Validation(
            "market region key cannot be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("host", &config.host),
        ("category_url", &config.category_url),
        ("item_info_url", &config.item_info_url),
    ] {
        Url::parse(value).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid {} for market '{}': {}", name, region, e))
        })?;
    }

    for placeholder in LISTING_PLACEHOLDERS {
        if !config.item_list_url.contains(placeholder) {
            return Err(ConfigError::Validation(format!(
                "item_list_url for market '{}' is missing the {} placeholder",
                region, placeholder
            )));
        }
    }

    let sample = config
        .item_list_url
        .replace("{catid}", "0")
        .replace("{offset}", "0")
        .replace("{limit}", "0");
    Url::parse(&sample).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid item_list_url for market '{}': {}",
            region, e
        ))
    })?;

    Ok(())
}
