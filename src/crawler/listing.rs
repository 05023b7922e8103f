//! Paginated listing walks over one category

use crate::config::{CrawlConfig, FetchConfig};
use crate::crawler::details::{BatchOutcome, DetailBatcher};
use crate::crawler::Fetcher;
use crate::market::{CategoryNode, Market};
use crate::storage::Storage;
use crate::{CrawlError, Result};
use std::time::Duration;

/// Pagination state for one category's walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingCursor {
    pub cat_id: i64,
    pub offset: u32,
    pub limit: u32,
}

impl ListingCursor {
    pub fn new(cat_id: i64, limit: u32) -> Self {
        Self {
            cat_id,
            offset: 0,
            limit,
        }
    }

    /// Moves to the next page
    pub fn advance(&mut self) {
        self.offset = self.offset.saturating_add(self.limit);
    }

    /// A short page ends the listing
    pub fn is_last_page(&self, count: usize) -> bool {
        count < self.limit as usize
    }
}

/// Knobs of a listing walk
#[derive(Debug, Clone)]
pub struct WalkSettings {
    pub limit: u32,
    /// Retries of a failing page before the walk gives up
    pub page_retries: u32,
    /// Linear backoff step between page retries
    pub retry_backoff: Duration,
    /// Pause between successful pages
    pub page_delay: Duration,
}

impl WalkSettings {
    pub fn new(crawl: &CrawlConfig, fetch: &FetchConfig, market: &Market) -> Self {
        Self {
            limit: crawl.page_limit,
            page_retries: crawl.page_retries,
            retry_backoff: Duration::from_millis(fetch.retry_backoff_ms),
            page_delay: market.sleep_interval,
        }
    }
}

/// Totals of one category walk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: u32,
    pub items: usize,
    pub appended: usize,
}

/// Paginates a category's item listing until a short page is seen
pub struct ListingWalker<'a> {
    fetcher: &'a Fetcher,
    market: &'a Market,
    settings: WalkSettings,
}

impl<'a> ListingWalker<'a> {
    pub fn new(fetcher: &'a Fetcher, market: &'a Market, settings: WalkSettings) -> Self {
        Self {
            fetcher,
            market,
            settings,
        }
    }

    /// Walks every page of `category`, resolving each page's items
    ///
    /// A page that keeps failing is retried `page_retries` times and then the
    /// walk is abandoned with [`CrawlError::PageRetriesExhausted`]; pages
    /// recorded before that stay recorded.
    pub async fn walk(
        &self,
        category: &CategoryNode,
        storage: &mut dyn Storage,
    ) -> Result<WalkSummary> {
        let mut summary = WalkSummary::default();
        if !category.is_leaf() {
            tracing::debug!("Category {} is not a leaf, nothing to walk", category.cat_id);
            return Ok(summary);
        }

        let mut cursor = ListingCursor::new(category.cat_id, self.settings.limit);

        loop {
            let (count, outcome) = self.page_with_retry(&cursor, storage).await?;
            summary.pages += 1;
            summary.items += count;
            summary.appended += outcome.appended;

            tracing::info!(
                "Category {} offset {} limit {}: {} items",
                cursor.cat_id,
                cursor.offset,
                cursor.limit,
                count
            );

            if cursor.is_last_page(count) {
                tracing::debug!(
                    "Category {} returned fewer than {} items, listing finished",
                    cursor.cat_id,
                    cursor.limit
                );
                break;
            }

            cursor.advance();
            if !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        Ok(summary)
    }

    async fn page_with_retry(
        &self,
        cursor: &ListingCursor,
        storage: &mut dyn Storage,
    ) -> Result<(usize, BatchOutcome)> {
        let attempts = self.settings.page_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.page(cursor, storage).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "Listing page for category {} at offset {} failed (attempt {}/{}): {}",
                        cursor.cat_id,
                        cursor.offset,
                        attempt,
                        attempts,
                        e
                    );
                    let backoff = self.settings.retry_backoff.saturating_mul(attempt);
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) => {
                    return Err(CrawlError::PageRetriesExhausted {
                        cat_id: cursor.cat_id,
                        offset: cursor.offset,
                        attempts,
                        last: Box::new(e),
                    });
                }
            }
        }
    }

    /// Fetches one page and hands its references to the detail batcher
    async fn page(
        &self,
        cursor: &ListingCursor,
        storage: &mut dyn Storage,
    ) -> Result<(usize, BatchOutcome)> {
        let url = self
            .market
            .listing_url(cursor.cat_id, cursor.offset, cursor.limit);
        let body = self.fetcher.get(&url).await?;
        let refs = self.market.kind.decode_listing(&body)?;

        let outcome = DetailBatcher::new(self.fetcher, self.market)
            .resolve(&refs, storage)
            .await?;

        Ok((refs.len(), outcome))
    }
}
