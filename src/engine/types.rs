use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::single_flight::FlightAborted;
use crate::market_data::adapters::ProviderError;
use crate::persist::PersistError;

// One coin's position in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub name: String,
    pub value: f64,
    pub rank: u32,
    #[serde(with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
}

/// How far a stored batch may sit from the reference time and still be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    /// Current-mode queries refetch once the newest batch is older than this.
    pub current: TimeDelta,
    /// Historical queries fail when nothing is stored within this distance.
    pub historical: TimeDelta,
}

impl FreshnessWindow {
    pub fn from_secs(current: u64, historical: u64) -> Self {
        Self {
            current: secs(current),
            historical: secs(historical),
        }
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self {
            current: TimeDelta::seconds(60),
            historical: TimeDelta::hours(24),
        }
    }
}

fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("no snapshot stored within the historical window of {requested}")]
    UnavailableTime { requested: DateTime<Utc> },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] PersistError),
    #[error(transparent)]
    Aborted(#[from] FlightAborted),
}

/// RFC 3339 with an explicit `+00:00` offset, e.g. `2023-08-12T17:00:00+00:00`.
pub mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
