use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::engine::types::RankedEntry;
use crate::persist::{closest_timestamp, window_bounds, PersistResult, SnapshotStore};

/// Process-local snapshot store. Used when no database is configured.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    batches: RwLock<BTreeMap<DateTime<Utc>, Vec<RankedEntry>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct batch timestamps held.
    pub fn batch_count(&self) -> usize {
        self.batches.read().len()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn insert_batch(&self, batch: &[RankedEntry]) -> PersistResult<()> {
        let mut batches = self.batches.write();
        for entry in batch {
            batches.entry(entry.timestamp).or_default().push(entry.clone());
        }
        debug!(entries = batch.len(), "stored batch in memory");
        Ok(())
    }

    async fn find_nearest_timestamp(
        &self,
        reference: DateTime<Utc>,
        window: TimeDelta,
    ) -> PersistResult<Option<DateTime<Utc>>> {
        let (lower, upper) = window_bounds(reference, window);
        let batches = self.batches.read();
        Ok(closest_timestamp(reference, batches.range(lower..=upper).map(|(ts, _)| *ts)))
    }

    async fn find_batch_at(&self, timestamp: DateTime<Utc>, limit: usize) -> PersistResult<Vec<RankedEntry>> {
        let mut entries = self
            .batches
            .read()
            .get(&timestamp)
            .cloned()
            .unwrap_or_default();
        entries.sort_by_key(|entry| entry.rank);
        entries.truncate(limit);
        Ok(entries)
    }
}
