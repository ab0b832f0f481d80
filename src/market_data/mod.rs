// Market data module entrypoint
pub mod adapters;       // provider-specific fetchers (CoinMarketCap, CryptoCompare)
