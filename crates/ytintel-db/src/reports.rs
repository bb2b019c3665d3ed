//! Database operations for the `report_cache` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use ytintel_core::{CacheKey, ReportStore, StoreError};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `report_cache` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportCacheRow {
    pub cache_key: String,
    pub video_id: String,
    pub pipeline_version: i32,
    pub requested_depth: String,
    pub payload: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// [`ReportStore`] backed by Postgres. Rows are keyed by the cache key digest.
#[derive(Debug, Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch the full row for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn get_row(&self, key: &CacheKey) -> Result<Option<ReportCacheRow>, DbError> {
        let row = sqlx::query_as::<_, ReportCacheRow>(
            "SELECT cache_key, video_id, pipeline_version, requested_depth, payload, stored_at \
             FROM report_cache \
             WHERE cache_key = $1",
        )
        .bind(key.digest())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert or replace the payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the upsert fails.
    pub async fn upsert(&self, key: &CacheKey, payload: &[u8]) -> Result<(), DbError> {
        let version = i32::try_from(key.pipeline_version()).unwrap_or(i32::MAX);
        sqlx::query(
            "INSERT INTO report_cache \
                 (cache_key, video_id, pipeline_version, requested_depth, payload, stored_at) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (cache_key) DO UPDATE SET \
                 payload = EXCLUDED.payload, \
                 stored_at = EXCLUDED.stored_at",
        )
        .bind(key.digest())
        .bind(key.video_id())
        .bind(version)
        .bind(key.depth().as_str())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the row stored under `key`. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the delete fails.
    pub async fn delete(&self, key: &CacheKey) -> Result<(), DbError> {
        sqlx::query("DELETE FROM report_cache WHERE cache_key = $1")
            .bind(key.digest())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_row(key)
            .await
            .map(|row| row.map(|r| r.payload))
            .map_err(into_store_error)
    }

    async fn store(&self, key: &CacheKey, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.upsert(key, &bytes).await.map_err(into_store_error)
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.delete(key).await.map_err(into_store_error)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<u64, StoreError> {
        // An age too large to subtract from now means nothing can be older.
        let Some(cutoff) = TimeDelta::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        purge_stale(&self.pool, cutoff)
            .await
            .map_err(into_store_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::ping(&self.pool)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }
}

fn into_store_error(err: DbError) -> StoreError {
    StoreError(err.to_string())
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Delete every row stored before `older_than`. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_stale(pool: &PgPool, older_than: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM report_cache WHERE stored_at < $1")
        .bind(older_than)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
