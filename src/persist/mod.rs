pub mod types;
pub use types::*;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::engine::types::RankedEntry;

/// Timestamp-keyed storage of ranked batches.
///
/// Nearest-timestamp resolution lives behind this trait so each backend can
/// use its own indexing; all of them break ties with [`closest_timestamp`].
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn insert_batch(&self, batch: &[RankedEntry]) -> PersistResult<()>;

    /// Stored batch timestamp closest to `reference`, at most `window` away.
    async fn find_nearest_timestamp(
        &self,
        reference: DateTime<Utc>,
        window: TimeDelta,
    ) -> PersistResult<Option<DateTime<Utc>>>;

    /// Entries stored at exactly `timestamp`, ascending by rank.
    async fn find_batch_at(&self, timestamp: DateTime<Utc>, limit: usize) -> PersistResult<Vec<RankedEntry>>;
}

/// Pick the candidate with the smallest distance to `reference`.
/// Ties keep the first candidate seen.
pub fn closest_timestamp<I>(reference: DateTime<Utc>, candidates: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut best: Option<(TimeDelta, DateTime<Utc>)> = None;
    for candidate in candidates {
        let distance = if candidate >= reference {
            candidate - reference
        } else {
            reference - candidate
        };
        match best {
            Some((best_distance, _)) if best_distance <= distance => {}
            _ => best = Some((distance, candidate)),
        }
    }
    best.map(|(_, ts)| ts)
}

/// Inclusive search bounds around `reference`, clamped to the representable range.
pub fn window_bounds(reference: DateTime<Utc>, window: TimeDelta) -> (DateTime<Utc>, DateTime<Utc>) {
    let lower = reference
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let upper = reference
        .checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (lower, upper)
}
