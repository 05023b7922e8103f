//! Crawl orchestration
//!
//! This module drives one crawl run per market:
//! - Resolving the market configuration and opening its store
//! - Synchronizing the category tree
//! - Walking the listing of every persisted leaf category
//! - Recording the run and its outcome

use crate::config::Config;
use crate::crawler::categories::CategorySync;
use crate::crawler::listing::{ListingWalker, WalkSettings};
use crate::crawler::Fetcher;
use crate::market::Market;
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::{CrawlError, Result};
use std::path::Path;

/// Where a run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Init,
    CategoriesSynced,
    ItemListsWalked,
    Idle,
}

/// Totals of one orchestrated run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Category nodes upserted by the sync
    pub categories: usize,
    /// Leaf categories whose walk completed
    pub leaf_categories: usize,
    /// Leaf categories whose walk was abandoned
    pub walks_failed: usize,
    pub pages: u32,
    pub items: usize,
    /// New snapshots appended
    pub appended: usize,
}

/// Composes category sync, listing walks, and detail batching for one market
pub struct CrawlOrchestrator {
    market: Market,
    fetcher: Fetcher,
    storage: SqliteStorage,
    settings: WalkSettings,
    config_hash: String,
    phase: CrawlPhase,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator for `region` over an already opened store
    ///
    /// # Returns
    ///
    /// * `Err(CrawlError::UnknownMarket)` - `region` has no market configured
    pub fn new(
        config: &Config,
        region: &str,
        storage: SqliteStorage,
        config_hash: &str,
    ) -> Result<Self> {
        let market = Market::resolve(config, region)?;
        let fetcher = Fetcher::new(config.fetch.clone())?;
        let settings = WalkSettings::new(&config.crawl, &config.fetch, &market);

        Ok(Self {
            market,
            fetcher,
            storage,
            settings,
            config_hash: config_hash.to_string(),
            phase: CrawlPhase::Init,
        })
    }

    /// Creates an orchestrator for `region`, opening the market's database
    /// under `config.database_dir`
    pub fn open(config: &Config, region: &str, config_hash: &str) -> Result<Self> {
        let market = Market::resolve(config, region)?;
        let dir = Path::new(&config.database_dir);
        std::fs::create_dir_all(dir).map_err(|e| {
            CrawlError::Config(crate::ConfigError::Validation(format!(
                "cannot create database_dir {}: {}",
                dir.display(),
                e
            )))
        })?;

        let path = dir.join(market.database_file_name());
        tracing::info!("Opening store {}", path.display());
        let storage = SqliteStorage::new(&path)?;

        Self::new(config, region, storage, config_hash)
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn into_storage(self) -> SqliteStorage {
        self.storage
    }

    /// Runs one linear pass and records it in the store
    ///
    /// A category sync failure aborts the run. A failing category walk is
    /// logged and the remaining categories are still walked.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        self.phase = CrawlPhase::Init;
        let label = format!("{}_{}", self.market.kind.name(), self.market.region);
        let run_id = self.storage.create_run(&label, &self.config_hash)?;
        tracing::info!("Starting crawl run {} for {}", run_id, label);

        let result = self.run_phases().await;

        let status = match &result {
            Ok(_) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };
        if let Err(e) = self.storage.finish_run(run_id, status) {
            tracing::warn!("Failed to record end of run {}: {}", run_id, e);
        }
        self.phase = CrawlPhase::Idle;

        match &result {
            Ok(summary) => tracing::info!(
                "Crawl run {} completed: {} categories, {} leaves walked ({} failed), {} pages, {} items, {} new snapshots",
                run_id,
                summary.categories,
                summary.leaf_categories,
                summary.walks_failed,
                summary.pages,
                summary.items,
                summary.appended
            ),
            Err(e) => tracing::error!("Crawl run {} failed: {}", run_id, e),
        }

        result
    }

    async fn run_phases(&mut self) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();

        summary.categories = CategorySync::new(&self.fetcher, &self.market)
            .sync(&mut self.storage)
            .await?;
        self.transition(CrawlPhase::CategoriesSynced);

        let leaves = self.storage.load_leaf_categories()?;
        tracing::info!("Walking {} leaf categories", leaves.len());

        let walker = ListingWalker::new(&self.fetcher, &self.market, self.settings.clone());
        for leaf in &leaves {
            match walker.walk(leaf, &mut self.storage).await {
                Ok(walk) => {
                    summary.leaf_categories += 1;
                    summary.pages += walk.pages;
                    summary.items += walk.items;
                    summary.appended += walk.appended;
                }
                Err(e) => {
                    tracing::error!(
                        "Abandoning category {} ({}): {}",
                        leaf.cat_id,
                        leaf.display_name,
                        e
                    );
                    summary.walks_failed += 1;
                }
            }
        }
        self.transition(CrawlPhase::ItemListsWalked);

        self.refresh_details().await?;

        Ok(summary)
    }

    /// Re-fetches details of already known items
    ///
    /// Listing walks already refresh every item they see, so this pass has no
    /// work of its own yet.
    pub async fn refresh_details(&mut self) -> Result<()> {
        tracing::debug!(
            "Detail refresh for {} skipped ({} known items)",
            self.market.region,
            self.storage.count_items()?
        );
        Ok(())
    }

    fn transition(&mut self, next: CrawlPhase) {
        tracing::debug!("Crawl phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

/// Crawls every region in order, one orchestrated run each
///
/// Stops at the first run that fails, including a region with no configured
/// market.
///
/// # Example
///
/// ```no_run
/// use crawlee::config::load_config_with_hash;
/// use crawlee::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("crawlee.toml"))?;
/// run_crawl(&config, &hash, &config.regions).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    regions: &[String],
) -> Result<Vec<(String, CrawlSummary)>> {
    let mut summaries = Vec::with_capacity(regions.len());
    for region in regions {
        let mut orchestrator = CrawlOrchestrator::open(config, region, config_hash)?;
        let summary = orchestrator.run().await?;
        summaries.push((region.clone(), summary));
    }
    Ok(summaries)
}
