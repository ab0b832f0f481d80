// Shared traits + error for the price and ranking providers

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// USD price keyed by both ticker symbol and full coin name.
pub type PriceMap = HashMap<String, f64>;

/// One position of the volume ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCoin {
    pub symbol: String,
    pub full_name: String,
}

impl RankedCoin {
    pub fn new(symbol: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), full_name: full_name.into() }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider}: request failed: {message}")]
    Transport { provider: &'static str, message: String },
    #[error("{provider}: unexpected HTTP status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider}: could not decode response: {message}")]
    Decode { provider: &'static str, message: String },
    #[error("{provider}: request rejected: {message}")]
    Rejected { provider: &'static str, message: String },
}

#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    async fn get_prices(&self) -> Result<PriceMap, ProviderError>;
}

#[async_trait::async_trait]
pub trait RankingProvider: Send + Sync {
    /// Coins ordered by descending volume.
    async fn get_ranked_list(&self) -> Result<Vec<RankedCoin>, ProviderError>;
}

pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

// Send the request and decode a 2xx JSON body.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &'static str,
) -> Result<T, ProviderError> {
    let transport = |e: reqwest::Error| ProviderError::Transport { provider, message: e.to_string() };

    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status { provider, status: status.as_u16() });
    }

    let body = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&body).map_err(|e| ProviderError::Decode { provider, message: e.to_string() })
}

pub mod coinmarketcap;
pub mod coinmarketcap_types;
pub mod cryptocompare;
pub mod cryptocompare_types;
