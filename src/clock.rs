//! Time source used by the resolver and the request validation.
//!
//! Everything that needs "now" goes through [`Clock`] so tests can pin time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognised ISO-8601 datetime: {0:?}")]
pub struct InvalidTime(pub String);

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Parse an ISO-8601 time descriptor into a UTC instant.
///
/// Accepts RFC 3339 with an offset, naive date-times (read as UTC) and bare
/// dates (midnight UTC).
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, InvalidTime> {
    let trimmed = raw.trim();
    let candidate = restore_plus_offset(trimmed);

    if let Ok(ts) = DateTime::parse_from_rfc3339(&candidate) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(&candidate, OFFSET_FORMAT) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    Err(InvalidTime(raw.to_string()))
}

// An unescaped `+` in a query string decodes to a space, turning
// `...T17:00:00+00:00` into `...T17:00:00 00:00`.
fn restore_plus_offset(raw: &str) -> String {
    if let Some((head, tail)) = raw.rsplit_once(' ') {
        let looks_like_offset = tail.len() == 5
            && tail.as_bytes()[2] == b':'
            && tail.chars().filter(|c| *c != ':').all(|c| c.is_ascii_digit());
        if looks_like_offset && head.contains('T') {
            return format!("{head}+{tail}");
        }
    }
    raw.to_string()
}
