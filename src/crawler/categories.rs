//! Category tree synchronization

use crate::crawler::Fetcher;
use crate::market::Market;
use crate::storage::Storage;
use crate::Result;

/// Fetches the category tree of a market and upserts every node
pub struct CategorySync<'a> {
    fetcher: &'a Fetcher,
    market: &'a Market,
}

impl<'a> CategorySync<'a> {
    pub fn new(fetcher: &'a Fetcher, market: &'a Market) -> Self {
        Self { fetcher, market }
    }

    /// Fetches the tree and upserts each main and sub node by `cat_id`
    ///
    /// Stops at the first fetch, decode, or storage error. Nodes upserted
    /// before the failure stay in the store; nodes missing from the tree are
    /// never removed.
    ///
    /// # Returns
    ///
    /// The number of nodes upserted
    pub async fn sync(&self, storage: &mut dyn Storage) -> Result<usize> {
        let body = self.fetcher.get(&self.market.category_url).await?;
        let nodes = self.market.kind.decode_categories(&body)?;
        tracing::debug!("Category tree for {} has {} nodes", self.market.region, nodes.len());

        for node in &nodes {
            storage.upsert_category(node).map_err(|e| {
                tracing::error!("Failed to upsert category {}: {}", node.cat_id, e);
                e
            })?;
        }

        tracing::info!("Synced {} categories for {}", nodes.len(), self.market.region);
        Ok(nodes.len())
    }
}
