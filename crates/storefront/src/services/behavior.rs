//! In-memory behavior aggregation with periodic flushes.
//!
//! Every ingested sample is folded into a shared [`BehaviorAggregate`]. A
//! background task takes the window every `flush_interval` and writes it to
//! `behavior_summary`; a failed write hands the window back so the next flush
//! covers it. A final flush runs when the shutdown signal fires.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use nudge_core::behavior::{BehaviorAggregate, BehaviorAverages, BehaviorSample, BehaviorWindow};

use crate::db::{BehaviorRepository, RepositoryError};

/// Current window as shown on the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub window_started_at: DateTime<Utc>,
    pub sample_count: u64,
    pub averages: Option<BehaviorAverages>,
}

/// Shared running aggregate.
#[derive(Clone)]
pub struct BehaviorAggregator {
    inner: Arc<Mutex<BehaviorAggregate>>,
}

impl Default for BehaviorAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BehaviorAggregate::new(Utc::now()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BehaviorAggregate> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, sample: &BehaviorSample) {
        self.lock().record(sample);
    }

    #[must_use]
    pub fn averages(&self) -> Option<BehaviorAverages> {
        self.lock().averages()
    }

    #[must_use]
    pub fn snapshot(&self) -> AggregateSnapshot {
        let aggregate = self.lock();
        AggregateSnapshot {
            window_started_at: aggregate.started_at(),
            sample_count: aggregate.sample_count(),
            averages: aggregate.averages(),
        }
    }

    /// Write the current window to storage and start a new one.
    ///
    /// Returns the flushed window, or `None` when there was nothing to write.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails. The window is merged back
    /// into the aggregate first, so no samples are lost.
    #[instrument(skip_all)]
    pub async fn flush(&self, pool: &PgPool) -> Result<Option<BehaviorWindow>, RepositoryError> {
        let window = self.lock().take(Utc::now());
        if window.is_empty() {
            debug!("Behavior window empty, nothing to flush");
            return Ok(None);
        }

        match BehaviorRepository::new(pool).insert_summary(&window).await {
            Ok(()) => {
                info!(samples = window.sample_count, "Flushed behavior window");
                Ok(Some(window))
            }
            Err(e) => {
                self.lock().restore(window);
                Err(e)
            }
        }
    }
}

/// Spawn the periodic flush task.
///
/// The first flush happens one `interval` after start. When `shutdown` flips
/// to `true` the task flushes once more and exits.
pub fn spawn_flush_task(
    aggregator: BehaviorAggregator,
    pool: PgPool,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting behavior flush task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = aggregator.flush(&pool).await {
                        warn!(error = %e, "Behavior flush failed, window kept for next attempt");
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        if let Err(e) = aggregator.flush(&pool).await {
            warn!(error = %e, "Final behavior flush failed");
        }
        info!("Behavior flush task stopped");
    })
}
