//! Batched item detail lookups

use crate::crawler::Fetcher;
use crate::market::{ItemRef, Market};
use crate::storage::{SnapshotStore, Storage};
use crate::Result;

/// Counts from resolving one batch of references
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Detail entries returned by the market
    pub resolved: usize,
    /// Entries that produced a new snapshot
    pub appended: usize,
    /// Entries without a usable identity
    pub skipped: usize,
    /// Entries whose persistence failed
    pub failed: usize,
}

/// Resolves full item details for a page of listing references
pub struct DetailBatcher<'a> {
    fetcher: &'a Fetcher,
    market: &'a Market,
}

impl<'a> DetailBatcher<'a> {
    pub fn new(fetcher: &'a Fetcher, market: &'a Market) -> Self {
        Self { fetcher, market }
    }

    /// Looks up details for `refs` in one request and records each item
    ///
    /// A fetch or decode failure aborts the whole batch. Once decoded, items
    /// are recorded independently: an entry without an identity is skipped and
    /// a storage failure only loses that entry.
    pub async fn resolve(&self, refs: &[ItemRef], storage: &mut dyn Storage) -> Result<BatchOutcome> {
        if refs.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let kind = self.market.kind;
        let body = kind.encode_detail_request(refs)?;
        let response = self
            .fetcher
            .post(&self.market.item_info_url, body, self.market.detail_headers())
            .await?;
        let details = kind.decode_details(&response)?;

        let mut outcome = BatchOutcome {
            resolved: details.len(),
            ..BatchOutcome::default()
        };
        let mut store = SnapshotStore::new(storage);

        for attributes in &details {
            let Some(item_id) = kind.item_id(attributes) else {
                tracing::warn!(
                    "Detail entry without a numeric '{}' field, skipping",
                    kind.item_id_field()
                );
                outcome.skipped += 1;
                continue;
            };

            match store.record(item_id, attributes) {
                Ok(true) => outcome.appended += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to record item {}: {}", item_id, e);
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Resolved {} of {} items ({} new snapshots)",
            outcome.resolved,
            refs.len(),
            outcome.appended
        );

        Ok(outcome)
    }
}
