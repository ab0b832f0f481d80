//! Coin resolution: decides between a stored snapshot and a live fetch.
//!
//! A query without a timestamp ("current" mode) is served from the newest
//! batch stored within the current window, or fetched live from both
//! providers when there is none. A query with a timestamp ("historical"
//! mode) is only ever served from the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::engine::merge::merge_ranked;
use crate::engine::persist_queue::PersistQueue;
use crate::engine::single_flight::SingleFlight;
use crate::engine::types::{FreshnessWindow, RankedEntry, ResolveError};
use crate::market_data::adapters::{PriceProvider, RankingProvider};
use crate::persist::SnapshotStore;

type LiveBatch = Result<Arc<[RankedEntry]>, ResolveError>;

pub struct CoinResolver {
    store: Arc<dyn SnapshotStore>,
    prices: Arc<dyn PriceProvider>,
    ranking: Arc<dyn RankingProvider>,
    clock: Arc<dyn Clock>,
    window: FreshnessWindow,
    live: SingleFlight<LiveBatch>,
    writes: PersistQueue,
}

impl CoinResolver {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        prices: Arc<dyn PriceProvider>,
        ranking: Arc<dyn RankingProvider>,
        clock: Arc<dyn Clock>,
        window: FreshnessWindow,
    ) -> Self {
        debug!(?window, "initialised coin resolver");
        Self {
            store,
            prices,
            ranking,
            clock,
            window,
            live: SingleFlight::new(),
            writes: PersistQueue::new(),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Top `limit` coins by volume, now or at `timestamp`.
    ///
    /// Live fetches are persisted in the background; the returned entries do
    /// not wait for that write.
    ///
    /// # Errors
    /// [`ResolveError::UnavailableTime`] when a historical query has no stored
    /// batch within the historical window. Provider and store failures are
    /// passed through unchanged.
    #[instrument(skip(self), fields(historical = timestamp.is_some()))]
    pub async fn fetch_top(
        &self,
        limit: usize,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<RankedEntry>, ResolveError> {
        match self.resolve_fetch_target(timestamp).await? {
            Some(target) => {
                info!(%target, "fetching coins from store");
                metrics::counter!("coinrank_cache_hits_total").increment(1);
                Ok(self.store.find_batch_at(target, limit).await?)
            }
            None => {
                info!("fetching coins from remote providers");
                let batch = self.fetch_live().await?;
                Ok(batch.iter().take(limit).cloned().collect())
            }
        }
    }

    /// Stored batch timestamp to serve, or `None` when a live fetch is needed.
    pub async fn resolve_fetch_target(
        &self,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>, ResolveError> {
        let Some(requested) = timestamp else {
            let now = self.clock.now();
            // a batch exactly `current` old is already stale
            let recent = self
                .store
                .find_nearest_timestamp(now, self.window.current)
                .await?
                .filter(|found| (now - *found).abs() < self.window.current);
            if recent.is_none() {
                debug!(%now, "no batch within the current window");
            }
            return Ok(recent);
        };

        match self
            .store
            .find_nearest_timestamp(requested, self.window.historical)
            .await?
        {
            Some(found) => Ok(Some(found)),
            None => {
                debug!(%requested, "could not find any batch around requested time");
                Err(ResolveError::UnavailableTime { requested })
            }
        }
    }

    // Concurrent cold-cache callers share one fetch and one write.
    async fn fetch_live(&self) -> LiveBatch {
        self.live
            .run(|| {
                let prices = Arc::clone(&self.prices);
                let ranking = Arc::clone(&self.ranking);
                let clock = Arc::clone(&self.clock);
                let store = Arc::clone(&self.store);
                let writes = self.writes.clone();

                async move {
                    let batch = fetch_and_merge(prices.as_ref(), ranking.as_ref(), clock.as_ref()).await?;
                    metrics::counter!("coinrank_live_fetches_total").increment(1);
                    if batch.is_empty() {
                        warn!("no ranked coin had a price; nothing to persist");
                    } else {
                        writes.spawn(store, Arc::clone(&batch));
                    }
                    Ok::<_, ResolveError>(batch)
                }
                .boxed()
            })
            .await?
    }

    /// Background writes not yet reaped.
    #[cfg(test)]
    pub(crate) fn pending_writes(&self) -> usize {
        self.writes.pending()
    }

    /// Wait for every background write to finish.
    pub async fn drain(&self) {
        self.writes.drain().await;
    }
}

/// Query both providers concurrently and merge their answers.
///
/// `now` is read once, before the calls, and stamps every entry.
pub async fn fetch_and_merge(
    prices: &dyn PriceProvider,
    ranking: &dyn RankingProvider,
    clock: &dyn Clock,
) -> Result<Arc<[RankedEntry]>, ResolveError> {
    let now = clock.now();
    let (price_map, ranked) = tokio::try_join!(prices.get_prices(), ranking.get_ranked_list())?;
    let merged = merge_ranked(&price_map, &ranked, now);
    debug!(ranked = ranked.len(), kept = merged.len(), "merged provider data");
    Ok(merged.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::RankedCoin;
    use crate::testing::*;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn fetching_top_coins_now_returns_coins() {
        let h = Harness::new();

        let results = h.resolver.fetch_top(2, None).await.unwrap();

        assert_eq!(results, sample_results());
        assert_eq!(h.prices.calls(), 1);
        assert_eq!(h.ranking.calls(), 1);
    }

    #[tokio::test]
    async fn live_results_are_truncated() {
        let h = Harness::new();
        let results = h.resolver.fetch_top(1, None).await.unwrap();
        assert_eq!(results, sample_results()[..1].to_vec());
    }

    #[tokio::test]
    async fn live_fetch_is_persisted_in_background() {
        let h = Harness::new();
        h.resolver.fetch_top(10, None).await.unwrap();
        h.resolver.drain().await;

        assert_eq!(h.resolver.pending_writes(), 0);
        assert_eq!(h.store.batch_count(), 1);
        let stored = h.store.find_batch_at(sample_time(), 10).await.unwrap();
        assert_eq!(stored, sample_results());
    }

    #[tokio::test]
    async fn current_query_within_window_uses_store() {
        let h = Harness::new();
        h.resolver.fetch_top(10, None).await.unwrap();
        h.resolver.drain().await;

        h.clock.advance(TimeDelta::seconds(30));
        let results = h.resolver.fetch_top(1, None).await.unwrap();

        assert_eq!(results, sample_results()[..1].to_vec());
        assert_eq!(h.prices.calls(), 1);
        assert_eq!(h.ranking.calls(), 1);
    }

    #[tokio::test]
    async fn current_window_expires_at_its_length() {
        let h = Harness::new();
        h.resolver.fetch_top(10, None).await.unwrap();
        h.resolver.drain().await;

        h.clock.advance(TimeDelta::seconds(59));
        h.resolver.fetch_top(10, None).await.unwrap();
        assert_eq!(h.prices.calls(), 1);

        h.clock.advance(TimeDelta::seconds(1));
        let results = h.resolver.fetch_top(10, None).await.unwrap();
        assert_eq!(h.prices.calls(), 2);
        assert_eq!(h.ranking.calls(), 2);
        assert!(results.iter().all(|entry| entry.timestamp == sample_time() + TimeDelta::seconds(60)));
    }

    #[tokio::test]
    async fn dropped_caller_does_not_leave_a_stale_fetch_behind() {
        let h = Harness::new();

        // the first poll starts the live fetch, then the caller disconnects
        assert!(h.resolver.fetch_top(10, None).now_or_never().is_none());
        for _ in 0..100 {
            if h.store.batch_count() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        h.resolver.drain().await;
        assert_eq!(h.store.batch_count(), 1);
        assert_eq!(h.prices.calls(), 1);

        let later = sample_time() + TimeDelta::hours(2);
        h.clock.set(later);
        let results = h.resolver.fetch_top(10, None).await.unwrap();

        assert_eq!(h.prices.calls(), 2);
        assert!(results.iter().all(|entry| entry.timestamp == later));
    }

    #[tokio::test]
    async fn current_query_after_window_refetches() {
        let h = Harness::new();
        h.resolver.fetch_top(10, None).await.unwrap();
        h.resolver.drain().await;

        let later = sample_time() + TimeDelta::seconds(61);
        h.clock.set(later);
        h.prices.set(sample_prices_later());
        h.ranking.set(sample_ranking_later());
        let results = h.resolver.fetch_top(10, None).await.unwrap();

        let expected: Vec<RankedEntry> = sample_results_later()
            .into_iter()
            .map(|entry| RankedEntry { timestamp: later, ..entry })
            .collect();
        assert_eq!(results, expected);
        assert_eq!(h.prices.calls(), 2);
        assert_eq!(h.ranking.calls(), 2);

        h.resolver.drain().await;
        assert_eq!(h.store.batch_count(), 2);
    }

    #[tokio::test]
    async fn historical_query_within_window_uses_store() {
        let h = Harness::new();
        h.store.insert_batch(&sample_results()).await.unwrap();
        h.clock.advance(TimeDelta::days(3));

        let requested = sample_time() + TimeDelta::hours(23);
        let results = h.resolver.fetch_top(10, Some(requested)).await.unwrap();

        assert_eq!(results, sample_results());
        assert_eq!(h.prices.calls(), 0);
        assert_eq!(h.ranking.calls(), 0);
    }

    #[tokio::test]
    async fn historical_query_picks_closest_batch() {
        let h = Harness::new();
        h.store.insert_batch(&sample_results()).await.unwrap();
        h.store.insert_batch(&sample_results_later()).await.unwrap();

        let requested = sample_time_long_after() - TimeDelta::minutes(5);
        let results = h.resolver.fetch_top(10, Some(requested)).await.unwrap();
        assert_eq!(results, sample_results_later());
    }

    #[tokio::test]
    async fn historical_query_outside_window_is_unavailable() {
        let h = Harness::new();
        h.store.insert_batch(&sample_results()).await.unwrap();

        let requested = sample_time() + TimeDelta::hours(25);
        let err = h.resolver.fetch_top(10, Some(requested)).await.unwrap_err();

        assert!(matches!(err, ResolveError::UnavailableTime { requested: r } if r == requested));
        assert_eq!(h.prices.calls(), 0);
        assert_eq!(h.ranking.calls(), 0);
    }

    #[tokio::test]
    async fn historical_query_never_falls_back_to_live() {
        let h = Harness::new();
        let err = h.resolver.fetch_top(10, Some(sample_time())).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnavailableTime { .. }));
        assert_eq!(h.prices.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_propagates_without_persisting() {
        let h = Harness::new();
        h.ranking.fail_next();

        let err = h.resolver.fetch_top(10, None).await.unwrap_err();
        h.resolver.drain().await;

        assert!(matches!(err, ResolveError::Provider(_)));
        assert_eq!(h.store.batch_count(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_does_not_reach_the_caller() {
        let prices = Arc::new(MockPriceProvider::new(sample_prices()));
        let ranking = Arc::new(MockRankingProvider::new(sample_ranking()));
        let resolver = CoinResolver::new(
            Arc::new(FailingStore),
            prices,
            ranking,
            Arc::new(crate::clock::ManualClock::new(sample_time())),
            FreshnessWindow::default(),
        );

        let results = resolver.fetch_top(10, None).await.unwrap();
        resolver.drain().await;
        assert_eq!(results, sample_results());
    }

    #[tokio::test]
    async fn concurrent_cold_calls_fetch_once() {
        let h = Harness::new();

        let (a, b) = tokio::join!(h.resolver.fetch_top(10, None), h.resolver.fetch_top(1, None));
        h.resolver.drain().await;

        assert_eq!(a.unwrap(), sample_results());
        assert_eq!(b.unwrap(), sample_results()[..1].to_vec());
        assert_eq!(h.prices.calls(), 1);
        assert_eq!(h.ranking.calls(), 1);
        assert_eq!(h.store.batch_count(), 1);
    }

    #[tokio::test]
    async fn empty_merge_is_not_persisted() {
        let h = Harness::new();
        h.ranking.set(vec![RankedCoin::new("DOGE", "Dogecoin")]);

        let results = h.resolver.fetch_top(10, None).await.unwrap();
        h.resolver.drain().await;

        assert!(results.is_empty());
        assert_eq!(h.store.batch_count(), 0);
    }

    #[tokio::test]
    async fn merge_reads_clock_once() {
        let prices = MockPriceProvider::new(sample_prices());
        let ranking = MockRankingProvider::new(sample_ranking());
        let clock = crate::clock::ManualClock::new(sample_time());

        let batch = fetch_and_merge(&prices, &ranking, &clock).await.unwrap();
        assert!(batch.iter().all(|entry| entry.timestamp == sample_time()));
    }
}
