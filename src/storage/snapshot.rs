//! Dated snapshot recording with per-day deduplication

use crate::market::Attributes;
use crate::storage::traits::{Storage, StorageResult};
use chrono::{DateTime, NaiveDate, Utc};

/// Calendar date a snapshot taken at `at` is filed under
pub fn ingestion_date(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Records item sightings against a [`Storage`] backend
///
/// Recording is two steps: the identity row is touched, then the snapshot is
/// appended unless one already exists for the day. A crash between the steps
/// leaves `mtime` refreshed without a matching history entry.
pub struct SnapshotStore<'a> {
    storage: &'a mut dyn Storage,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(storage: &'a mut dyn Storage) -> Self {
        Self { storage }
    }

    /// Records a sighting of `item_id` now
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A new snapshot was appended for today
    /// * `Ok(false)` - Today's snapshot already existed; only `mtime` changed
    pub fn record(&mut self, item_id: i64, attributes: &Attributes) -> StorageResult<bool> {
        self.record_at(item_id, attributes, Utc::now())
    }

    /// Records a sighting of `item_id` as if observed at `at`
    pub fn record_at(
        &mut self,
        item_id: i64,
        attributes: &Attributes,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.storage.touch_item(item_id, at.timestamp())?;

        let date = ingestion_date(at);
        if self.storage.has_snapshot(item_id, date)? {
            tracing::trace!("Item {} already has a snapshot for {}", item_id, date);
            return Ok(false);
        }

        self.storage.append_snapshot(item_id, date, attributes)
    }
}
