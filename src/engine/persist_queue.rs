use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::engine::types::RankedEntry;
use crate::persist::SnapshotStore;

/// Background batch writes that nobody awaits on the request path.
///
/// Failures are logged and counted here; [`PersistQueue::drain`] lets
/// shutdown wait for whatever is still in flight.
#[derive(Clone, Default)]
pub struct PersistQueue {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl PersistQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, store: Arc<dyn SnapshotStore>, batch: Arc<[RankedEntry]>) {
        let mut tasks = self.tasks.lock();
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!(error = %e, "snapshot write task aborted");
            }
        }

        tasks.spawn(async move {
            let timestamp = batch.first().map(|entry| entry.timestamp);
            match store.insert_batch(&batch).await {
                Ok(()) => debug!(?timestamp, entries = batch.len(), "persisted batch"),
                Err(e) => {
                    metrics::counter!("coinrank_persist_failures_total").increment(1);
                    error!(?timestamp, error = %e, "failed to persist batch");
                }
            }
        });
    }

    /// Writes spawned and not yet reaped.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        if !tasks.is_empty() {
            debug!(pending = tasks.len(), "waiting for snapshot writes");
        }
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!(error = %e, "snapshot write task aborted during drain");
            }
        }
    }
}
