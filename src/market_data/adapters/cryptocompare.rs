// CryptoCompare ranking adapter: top coins by 24h total volume

use reqwest::Client;
use tracing::{debug, instrument};

use super::cryptocompare_types::TopVolumeResponse;
use super::{fetch_json, ProviderError, RankedCoin, RankingProvider};

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";
const PROVIDER_ID: &str = "cryptocompare";

pub struct CryptoCompareProvider {
    client: Client,
    base_url: String, // "https://min-api.cryptocompare.com"
    api_key: String,
    limit: u32,
}

impl CryptoCompareProvider {
    pub fn new(client: Client, base_url: &str, api_key: &str, limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            limit,
        }
    }

    fn top_volume_url(&self) -> String {
        format!("{}/data/top/totalvolfull", self.base_url)
    }
}

/// Keep the response order: it is the volume ranking.
pub fn ranked_coins(response: TopVolumeResponse) -> Result<Vec<RankedCoin>, ProviderError> {
    if response.response.as_deref() == Some("Error") {
        return Err(ProviderError::Rejected {
            provider: PROVIDER_ID,
            message: response.message.unwrap_or_default(),
        });
    }
    Ok(response
        .data
        .into_iter()
        .map(|item| RankedCoin::new(item.coin_info.name, item.coin_info.full_name))
        .collect())
}

#[async_trait::async_trait]
impl RankingProvider for CryptoCompareProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_ID))]
    async fn get_ranked_list(&self) -> Result<Vec<RankedCoin>, ProviderError> {
        let request = self
            .client
            .get(self.top_volume_url())
            .header("Accept", "application/json")
            .header("Authorization", format!("Apikey {}", self.api_key))
            .query(&[("limit", self.limit.to_string()), ("tsym", "USD".to_string())]);

        let response: TopVolumeResponse = fetch_json(request, PROVIDER_ID).await?;
        let coins = ranked_coins(response)?;
        debug!(coins = coins.len(), "fetched volume ranking");
        Ok(coins)
    }
}
