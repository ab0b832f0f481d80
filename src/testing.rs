// Shared fixtures and doubles for the unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;

use crate::clock::ManualClock;
use crate::engine::resolver::CoinResolver;
use crate::engine::types::{FreshnessWindow, RankedEntry};
use crate::market_data::adapters::{PriceMap, PriceProvider, ProviderError, RankedCoin, RankingProvider};
use crate::persist::memory::InMemorySnapshotStore;
use crate::persist::{PersistError, PersistResult, SnapshotStore};

pub fn sample_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 12, 17, 0, 0).unwrap()
}

pub fn sample_time_long_after() -> DateTime<Utc> {
    sample_time() + TimeDelta::hours(6)
}

pub fn sample_prices() -> PriceMap {
    PriceMap::from([
        ("BTC".to_string(), 29434.824505477198),
        ("ETH".to_string(), 1851.0382543598475),
    ])
}

pub fn sample_prices_later() -> PriceMap {
    PriceMap::from([("ETH".to_string(), 2500.0), ("BTC".to_string(), 1800.0)])
}

pub fn sample_ranking() -> Vec<RankedCoin> {
    vec![RankedCoin::new("BTC", "Bitcoin"), RankedCoin::new("ETH", "Ethereum")]
}

pub fn sample_ranking_later() -> Vec<RankedCoin> {
    vec![RankedCoin::new("ETH", "Ethereum"), RankedCoin::new("BTC", "Bitcoin")]
}

fn entry(name: &str, value: f64, rank: u32, timestamp: DateTime<Utc>) -> RankedEntry {
    RankedEntry { name: name.to_string(), value, rank, timestamp }
}

pub fn sample_results() -> Vec<RankedEntry> {
    vec![
        entry("BTC", 29434.824505477198, 1, sample_time()),
        entry("ETH", 1851.0382543598475, 2, sample_time()),
    ]
}

pub fn sample_results_later() -> Vec<RankedEntry> {
    vec![
        entry("ETH", 2500.0, 1, sample_time_long_after()),
        entry("BTC", 1800.0, 2, sample_time_long_after()),
    ]
}

/// Price provider returning a fixed map and counting calls.
pub struct MockPriceProvider {
    prices: Mutex<PriceMap>,
    calls: AtomicUsize,
}

impl MockPriceProvider {
    pub fn new(prices: PriceMap) -> Self {
        Self { prices: Mutex::new(prices), calls: AtomicUsize::new(0) }
    }

    pub fn set(&self, prices: PriceMap) {
        *self.prices.lock() = prices;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    async fn get_prices(&self) -> Result<PriceMap, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // behave like a network call: suspend at least once
        tokio::task::yield_now().await;
        Ok(self.prices.lock().clone())
    }
}

/// Ranking provider returning a fixed list, optionally failing once.
pub struct MockRankingProvider {
    ranking: Mutex<Vec<RankedCoin>>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MockRankingProvider {
    pub fn new(ranking: Vec<RankedCoin>) -> Self {
        Self {
            ranking: Mutex::new(ranking),
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn set(&self, ranking: Vec<RankedCoin>) {
        *self.ranking.lock() = ranking;
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankingProvider for MockRankingProvider {
    async fn get_ranked_list(&self) -> Result<Vec<RankedCoin>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Status { provider: "mock", status: 503 });
        }
        Ok(self.ranking.lock().clone())
    }
}

/// Store whose writes always fail and which never has anything to read.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn insert_batch(&self, _batch: &[RankedEntry]) -> PersistResult<()> {
        Err(PersistError::Io("disk on fire".into()))
    }

    async fn find_nearest_timestamp(
        &self,
        _reference: DateTime<Utc>,
        _window: TimeDelta,
    ) -> PersistResult<Option<DateTime<Utc>>> {
        Ok(None)
    }

    async fn find_batch_at(&self, _timestamp: DateTime<Utc>, _limit: usize) -> PersistResult<Vec<RankedEntry>> {
        Ok(Vec::new())
    }
}

/// A resolver wired to mocks, with handles to every collaborator.
pub struct Harness {
    pub resolver: Arc<CoinResolver>,
    pub store: Arc<InMemorySnapshotStore>,
    pub prices: Arc<MockPriceProvider>,
    pub ranking: Arc<MockRankingProvider>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemorySnapshotStore::new());
        let prices = Arc::new(MockPriceProvider::new(sample_prices()));
        let ranking = Arc::new(MockRankingProvider::new(sample_ranking()));
        let clock = Arc::new(ManualClock::new(sample_time()));
        let resolver = Arc::new(CoinResolver::new(
            store.clone(),
            prices.clone(),
            ranking.clone(),
            clock.clone(),
            FreshnessWindow::default(),
        ));
        Self { resolver, store, prices, ranking, clock }
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
