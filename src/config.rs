//! Runtime settings.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! `COINRANK_*` environment variables (`__` separates nested keys) and the
//! legacy unprefixed variables the service has always read. CLI flags are
//! applied on top by the binary.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::api::LimitBounds;
use crate::engine::types::FreshnessWindow;
use crate::market_data::adapters::{coinmarketcap, cryptocompare};

const DEFAULT_CONFIG_FILE: &str = "coinrank.toml";
const ENV_PREFIX: &str = "COINRANK";

// legacy variable -> settings key
const LEGACY_VARS: [(&str, &str); 3] = [
    ("COIN_MARKET_CAP_API_KEY", "providers.coinmarketcap.api_key"),
    ("CRYPTO_COMPARE_API_KEY", "providers.cryptocompare.api_key"),
    ("DATABASE_URL", "database.url"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub freshness: FreshnessSettings,
    pub limits: LimitSettings,
    pub providers: ProviderSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    /// Prometheus scrape address, used with the `metrics-exporter` feature.
    pub metrics_bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            metrics_bind: SocketAddr::from(([0, 0, 0, 0], 9000)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { filter: "info,coinrank_rs=debug".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FreshnessSettings {
    pub current_secs: u64,
    pub historical_secs: u64,
}

impl Default for FreshnessSettings {
    fn default() -> Self {
        Self { current_secs: 60, historical_secs: 86_400 }
    }
}

impl FreshnessSettings {
    pub fn window(&self) -> FreshnessWindow {
        FreshnessWindow::from_secs(self.current_secs, self.historical_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub min: usize,
    pub max: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        let bounds = LimitBounds::default();
        Self { min: bounds.min, max: bounds.max }
    }
}

impl LimitSettings {
    pub fn bounds(&self) -> LimitBounds {
        LimitBounds { min: self.min, max: self.max }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub timeout_secs: u64,
    pub coinmarketcap: CoinMarketCapSettings,
    pub cryptocompare: CryptoCompareSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            coinmarketcap: CoinMarketCapSettings::default(),
            cryptocompare: CryptoCompareSettings::default(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoinMarketCapSettings {
    pub base_url: String,
    pub api_key: String,
    pub listing_limit: u32,
}

impl Default for CoinMarketCapSettings {
    fn default() -> Self {
        Self {
            base_url: coinmarketcap::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            listing_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CryptoCompareSettings {
    pub base_url: String,
    pub api_key: String,
    pub limit: u32,
}

impl Default for CryptoCompareSettings {
    fn default() -> Self {
        Self {
            base_url: cryptocompare::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Postgres URL. Without one, snapshots are kept in memory only.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { url: None, max_connections: 5 }
    }
}

impl Settings {
    /// Load from `path` (or `coinrank.toml` if present) and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_sources(path, env)
    }

    pub fn from_sources(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        for (var, key) in LEGACY_VARS {
            let value = env.get(var).filter(|v| !v.trim().is_empty()).cloned();
            builder = builder.set_override_option(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.min == 0 || self.limits.min > self.limits.max {
            return Err(ConfigError::Message(format!(
                "limits.min ({}) must be positive and not above limits.max ({})",
                self.limits.min, self.limits.max
            )));
        }
        Ok(())
    }
}
