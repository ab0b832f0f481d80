use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::engine::types::RankedEntry;
use crate::persist::types::{PersistError, PersistResult, SnapshotRow};
use crate::persist::{closest_timestamp, window_bounds, SnapshotStore};

/// Snapshot store backed by the `ranked_entries` table.
#[derive(Debug, Clone)]
pub struct PostgresSnapshotStore {
    connection_pool: PgPool,
}

impl PostgresSnapshotStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> PersistResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(connection_pool: PgPool) -> Self {
        Self { connection_pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> PersistResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.connection_pool)
            .await
            .map_err(|e| PersistError::Migration(e.to_string()))
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    #[instrument(skip_all, fields(entries = batch.len()))]
    async fn insert_batch(&self, batch: &[RankedEntry]) -> PersistResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.connection_pool.begin().await?;
        for entry in batch {
            let rank = i32::try_from(entry.rank)
                .map_err(|_| PersistError::FormatMismatch(format!("rank {} does not fit INTEGER", entry.rank)))?;
            sqlx::query(
                r#"
                INSERT INTO ranked_entries (name, value, rank, "timestamp")
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&entry.name)
            .bind(entry.value)
            .bind(rank)
            .bind(entry.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("batch committed");
        Ok(())
    }

    async fn find_nearest_timestamp(
        &self,
        reference: DateTime<Utc>,
        window: TimeDelta,
    ) -> PersistResult<Option<DateTime<Utc>>> {
        let (lower, upper) = window_bounds(reference, window);
        let candidates: Vec<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT "timestamp"
            FROM ranked_entries
            WHERE "timestamp" BETWEEN $1 AND $2
            ORDER BY "timestamp" ASC
            "#,
        )
        .bind(lower)
        .bind(upper)
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(closest_timestamp(reference, candidates))
    }

    async fn find_batch_at(&self, timestamp: DateTime<Utc>, limit: usize) -> PersistResult<Vec<RankedEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT name, value, rank, "timestamp"
            FROM ranked_entries
            WHERE "timestamp" = $1
            ORDER BY rank ASC
            LIMIT $2
            "#,
        )
        .bind(timestamp)
        .bind(limit)
        .fetch_all(&self.connection_pool)
        .await?;

        rows.into_iter().map(RankedEntry::try_from).collect()
    }
}
