use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

type Flight<T> = Shared<BoxFuture<'static, Result<T, FlightAborted>>>;
type Slot<T> = Arc<Mutex<Option<(u64, Flight<T>)>>>;

/// The spawned work panicked or was cancelled before producing a value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("in-flight task did not complete: {0}")]
pub struct FlightAborted(pub String);

/// Coalesces concurrent calls onto one in-flight task.
///
/// The first caller spawns the work; callers arriving before it finishes
/// await the same result. The work runs on its own task, so it completes
/// and empties the slot even when every caller has gone away. The next call
/// after that starts fresh.
pub struct SingleFlight<T: Clone> {
    slot: Slot<T>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self { slot: Arc::new(Mutex::new(None)), next_id: AtomicU64::new(0) }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F>(&self, start: F) -> Result<T, FlightAborted>
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let (id, work) = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some((id, work)) => {
                    debug!(flight = id, "joining in-flight call");
                    (*id, work.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let work = launch(Arc::clone(&self.slot), id, start());
                    *slot = Some((id, work.clone()));
                    (id, work)
                }
            }
        };

        let result = work.await;
        // the task clears its own slot; this covers a task that panicked
        release(&self.slot, id);
        result
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }
}

// Must be called with the slot locked, so the task cannot release before
// the caller has stored it.
fn launch<T>(slot: Slot<T>, id: u64, work: BoxFuture<'static, T>) -> Flight<T>
where
    T: Clone + Send + Sync + 'static,
{
    let handle = tokio::spawn(async move {
        let output = work.await;
        release(&slot, id);
        output
    });

    async move { handle.await.map_err(|e| FlightAborted(e.to_string())) }
        .boxed()
        .shared()
}

fn release<T: Clone>(slot: &Mutex<Option<(u64, Flight<T>)>>, id: u64) {
    let mut slot = slot.lock();
    if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
        *slot = None;
    }
}
