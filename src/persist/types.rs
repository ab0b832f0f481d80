use chrono::{DateTime, Utc};

use crate::engine::types::RankedEntry;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    #[error("I/O failure: {0}")]
    Io(String),
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for PersistError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                PersistError::FormatMismatch(e.to_string())
            }
            other => PersistError::Io(other.to_string()),
        }
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// One row of `ranked_entries`.
#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub name: String,
    pub value: f64,
    pub rank: i32,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for RankedEntry {
    type Error = PersistError;

    fn try_from(row: SnapshotRow) -> PersistResult<Self> {
        let rank = u32::try_from(row.rank)
            .map_err(|_| PersistError::FormatMismatch(format!("negative rank {} for {}", row.rank, row.name)))?;
        Ok(RankedEntry {
            name: row.name,
            value: row.value,
            rank,
            timestamp: row.timestamp,
        })
    }
}
