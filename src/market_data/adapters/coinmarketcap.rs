// CoinMarketCap price adapter: latest USD listings sorted by market cap

use reqwest::Client;
use tracing::{debug, instrument};

use super::coinmarketcap_types::{Listing, ListingsResponse};
use super::{fetch_json, PriceMap, PriceProvider, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const PROVIDER_ID: &str = "coinmarketcap";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String, // "https://pro-api.coinmarketcap.com"
    api_key: String,
    listing_limit: u32, // how many listings to request, 100 in production
}

impl CoinMarketCapProvider {
    pub fn new(client: Client, base_url: &str, api_key: &str, listing_limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            listing_limit,
        }
    }

    fn listings_url(&self) -> String {
        format!("{}/v1/cryptocurrency/listings/latest", self.base_url)
    }
}

/// Index USD prices under both symbol and full name.
/// Listings arrive by descending market cap, so on a key clash the bigger coin keeps it.
pub fn price_map(listings: Vec<Listing>) -> PriceMap {
    let mut prices = PriceMap::with_capacity(listings.len() * 2);
    for listing in listings {
        let Some(price) = listing.quote.get("USD").and_then(|quote| quote.price) else {
            debug!(symbol = %listing.symbol, "listing has no USD price");
            continue;
        };
        prices.entry(listing.symbol).or_insert(price);
        prices.entry(listing.name).or_insert(price);
    }
    prices
}

#[async_trait::async_trait]
impl PriceProvider for CoinMarketCapProvider {
    #[instrument(skip(self), fields(provider = PROVIDER_ID))]
    async fn get_prices(&self) -> Result<PriceMap, ProviderError> {
        let request = self
            .client
            .get(self.listings_url())
            .header("Accept", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("limit", self.listing_limit.to_string()),
                ("sort", "market_cap".to_string()),
                ("convert", "USD".to_string()),
            ]);

        let listings: ListingsResponse = fetch_json(request, PROVIDER_ID).await?;
        let prices = price_map(listings.data);
        debug!(keys = prices.len(), "fetched prices");
        Ok(prices)
    }
}
