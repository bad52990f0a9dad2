//! Behavior sample storage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use nudge_core::BehaviorSampleId;
use nudge_core::behavior::{BehaviorAverages, BehaviorSample, BehaviorWindow};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct SampleRow {
    id: i32,
    scroll: f64,
    time_ms: f64,
    clicks: f64,
    cta_seen: f64,
    converted: f64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SumsRow {
    count: i64,
    scroll: f64,
    time_ms: f64,
    clicks: f64,
    cta_seen: f64,
    converted: f64,
}

/// A sample as stored, with its id and arrival time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSample {
    pub id: BehaviorSampleId,
    #[serde(flatten)]
    pub sample: BehaviorSample,
    pub created_at: DateTime<Utc>,
}

impl From<SampleRow> for StoredSample {
    fn from(row: SampleRow) -> Self {
        Self {
            id: BehaviorSampleId::new(row.id),
            sample: BehaviorSample {
                scroll: row.scroll,
                time: row.time_ms,
                clicks: row.clicks,
                cta_seen: row.cta_seen,
                converted: row.converted,
            },
            created_at: row.created_at,
        }
    }
}

/// Repository for behavior samples and flushed summaries.
pub struct BehaviorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BehaviorRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store one sample.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, sample: &BehaviorSample) -> Result<BehaviorSampleId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO storefront.behavior_sample (scroll, time_ms, clicks, cta_seen, converted) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(sample.scroll)
        .bind(sample.time)
        .bind(sample.clicks)
        .bind(sample.cta_seen)
        .bind(sample.converted)
        .fetch_one(self.pool)
        .await?;

        Ok(BehaviorSampleId::new(id))
    }

    /// Newest samples first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<StoredSample>, RepositoryError> {
        let rows = sqlx::query_as::<_, SampleRow>(
            "SELECT id, scroll, time_ms, clicks, cta_seen, converted, created_at \
             FROM storefront.behavior_sample \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredSample::from).collect())
    }

    /// The newest `limit` samples in arrival order, for training.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn training_set(&self, limit: i64) -> Result<Vec<BehaviorSample>, RepositoryError> {
        let mut samples: Vec<BehaviorSample> = self
            .list_recent(limit)
            .await?
            .into_iter()
            .map(|stored| stored.sample)
            .collect();
        samples.reverse();
        Ok(samples)
    }

    /// Total number of stored samples.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.behavior_sample")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Averages over every stored sample, or `None` when there are none.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn averages(&self) -> Result<Option<BehaviorAverages>, RepositoryError> {
        let row = sqlx::query_as::<_, SumsRow>(
            "SELECT COUNT(*) AS count, \
                    COALESCE(SUM(scroll), 0) AS scroll, \
                    COALESCE(SUM(time_ms), 0) AS time_ms, \
                    COALESCE(SUM(clicks), 0) AS clicks, \
                    COALESCE(SUM(cta_seen), 0) AS cta_seen, \
                    COALESCE(SUM(converted), 0) AS converted \
             FROM storefront.behavior_sample",
        )
        .fetch_one(self.pool)
        .await?;

        let count = u64::try_from(row.count)
            .map_err(|e| RepositoryError::DataCorruption(format!("sample count: {e}")))?;
        Ok(BehaviorAverages::from_sums(
            count,
            row.scroll,
            row.time_ms,
            row.clicks,
            row.cta_seen,
            row.converted,
        ))
    }

    /// Persist a flushed aggregation window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_summary(&self, window: &BehaviorWindow) -> Result<(), RepositoryError> {
        let sample_count = i64::try_from(window.sample_count)
            .map_err(|e| RepositoryError::DataCorruption(format!("sample count: {e}")))?;

        sqlx::query(
            "INSERT INTO storefront.behavior_summary \
                 (window_start, window_end, sample_count, scroll_sum, time_sum, clicks_sum, \
                  cta_seen_sum, converted_sum) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(window.started_at)
        .bind(window.ended_at)
        .bind(sample_count)
        .bind(window.scroll_sum)
        .bind(window.time_sum)
        .bind(window.clicks_sum)
        .bind(window.cta_seen_sum)
        .bind(window.converted_sum)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
