use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use coinrank_rs::api::{self, AppState};
use coinrank_rs::clock::SystemClock;
use coinrank_rs::config::Settings;
use coinrank_rs::engine::resolver::CoinResolver;
use coinrank_rs::market_data::adapters::coinmarketcap::CoinMarketCapProvider;
use coinrank_rs::market_data::adapters::cryptocompare::CryptoCompareProvider;
use coinrank_rs::market_data::adapters::http_client;
use coinrank_rs::persist::memory::InMemorySnapshotStore;
use coinrank_rs::persist::postgres::PostgresSnapshotStore;
use coinrank_rs::persist::SnapshotStore;
use coinrank_rs::telemetry;

/// Serve the top cryptocurrencies by volume, current or historical.
#[derive(Debug, Parser)]
#[command(name = "coinrank", version)]
struct Args {
    /// TOML settings file (defaults to ./coinrank.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Log filter directives, overrides `log.filter`
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(bind) = args.bind {
        settings.server.bind = bind;
    }
    if let Some(filter) = args.log_filter {
        settings.log.filter = filter;
    }

    telemetry::init_tracing(&settings.log.filter);
    telemetry::init_metrics(settings.server.metrics_bind).context("installing metrics exporter")?;

    let store = build_store(&settings).await?;

    let client = http_client(settings.providers.timeout());
    let cmc = &settings.providers.coinmarketcap;
    let cc = &settings.providers.cryptocompare;
    if cmc.api_key.is_empty() || cc.api_key.is_empty() {
        warn!("provider api key missing; live fetches will likely be rejected");
    }
    let prices = Arc::new(CoinMarketCapProvider::new(client.clone(), &cmc.base_url, &cmc.api_key, cmc.listing_limit));
    let ranking = Arc::new(CryptoCompareProvider::new(client, &cc.base_url, &cc.api_key, cc.limit));

    let resolver = Arc::new(CoinResolver::new(
        store,
        prices,
        ranking,
        Arc::new(SystemClock),
        settings.freshness.window(),
    ));
    let state = Arc::new(AppState::new(Arc::clone(&resolver), settings.limits.bounds()));

    let listener = tokio::net::TcpListener::bind(settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;
    info!(addr = %settings.server.bind, "coinrank listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    resolver.drain().await;
    info!("shutdown complete");
    Ok(())
}

async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    let Some(url) = settings.database.url.as_deref() else {
        warn!("no database url configured; snapshots are kept in memory only");
        return Ok(Arc::new(InMemorySnapshotStore::new()));
    };

    let store = PostgresSnapshotStore::connect(url, settings.database.max_connections)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    info!("using postgres snapshot store");
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        return std::future::pending().await;
    }
    info!("shutdown signal received, draining");
}
