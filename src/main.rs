//! Crawlee main entry point
//!
//! This is the command-line interface for the marketplace catalog crawler.

use anyhow::{bail, Context};
use clap::Parser;
use crawlee::config::{load_config_with_hash, Config};
use crawlee::crawler::run_crawl;
use crawlee::market::Market;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crawlee: an incremental marketplace catalog crawler
///
/// Crawlee syncs a marketplace's category tree, walks the item listing of
/// every leaf category, and keeps one dated snapshot per item and day.
#[derive(Parser, Debug)]
#[command(name = "crawlee")]
#[command(version = "1.0.0")]
#[command(about = "An incremental marketplace catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl only this region (repeatable); defaults to `regions` in the config
    #[arg(short, long = "region", value_name = "REGION")]
    regions: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from each region's database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let regions = if cli.regions.is_empty() {
        config.regions.clone()
    } else {
        cli.regions.clone()
    };
    if regions.is_empty() {
        bail!("no regions to crawl: set `regions` in the config or pass --region");
    }

    if cli.dry_run {
        handle_dry_run(&config, &regions)?;
    } else if cli.stats {
        handle_stats(&config, &regions)?;
    } else {
        handle_crawl(&config, &config_hash, &regions).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawlee=info,warn"),
            1 => EnvFilter::new("crawlee=debug,info"),
            2 => EnvFilter::new("crawlee=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: resolves every region and prints its plan
fn handle_dry_run(config: &Config, regions: &[String]) -> anyhow::Result<()> {
    println!("=== Crawlee Dry Run ===\n");

    println!("Fetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Rotate user agent: {}", config.fetch.rotate_user_agent);
    println!("  Timeout retries: {}", config.fetch.timeout_retries);
    println!("  Request timeout: {}ms", config.fetch.request_timeout_ms);

    println!("\nListing:");
    println!("  Page limit: {}", config.crawl.page_limit);
    println!("  Page retries: {}", config.crawl.page_retries);

    println!("\nRegions ({}):", regions.len());
    for region in regions {
        let market = Market::resolve(config, region)?;
        println!("  - {} ({})", region, market.kind.name());
        println!("    Categories: {}", market.category_url);
        println!("    Listing: {}", market.listing_url(0, 0, config.crawl.page_limit));
        println!("    Details: {}", market.item_info_url);
        println!(
            "    Store: {}",
            Path::new(&config.database_dir)
                .join(market.database_file_name())
                .display()
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: prints counts from each region's store
fn handle_stats(config: &Config, regions: &[String]) -> anyhow::Result<()> {
    use crawlee::output::{load_statistics, print_statistics};
    use crawlee::storage::SqliteStorage;

    for region in regions {
        let market = Market::resolve(config, region)?;
        let path = Path::new(&config.database_dir).join(market.database_file_name());
        println!("Database: {}\n", path.display());

        let storage = SqliteStorage::new(&path)?;
        let stats = load_statistics(&storage)?;
        print_statistics(&stats);
        println!();
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, regions: &[String]) -> anyhow::Result<()> {
    tracing::info!("Crawling regions: {}", regions.join(", "));

    match run_crawl(config, config_hash, regions).await {
        Ok(summaries) => {
            for (region, summary) in summaries {
                tracing::info!(
                    "{}: {} items seen, {} new snapshots",
                    region,
                    summary.items,
                    summary.appended
                );
            }
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
