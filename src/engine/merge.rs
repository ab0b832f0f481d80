use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::types::RankedEntry;
use crate::market_data::adapters::{PriceMap, RankedCoin};

/// Join the volume ranking with the price map.
///
/// Walks `ranking` in order, pricing each coin by symbol and falling back to
/// its full name. Coins without a price are dropped and do not use up a
/// rank, so the result is always ranked `1..=len`.
pub fn merge_ranked(prices: &PriceMap, ranking: &[RankedCoin], now: DateTime<Utc>) -> Vec<RankedEntry> {
    let mut merged: Vec<RankedEntry> = Vec::with_capacity(ranking.len());

    for coin in ranking {
        let price = prices
            .get(&coin.symbol)
            .or_else(|| prices.get(&coin.full_name));

        match price {
            Some(&value) => {
                let rank = merged.len() as u32 + 1;
                merged.push(RankedEntry {
                    name: coin.symbol.clone(),
                    value,
                    rank,
                    timestamp: now,
                });
            }
            None => debug!(symbol = %coin.symbol, "could not find price, skipping"),
        }
    }

    merged
}
