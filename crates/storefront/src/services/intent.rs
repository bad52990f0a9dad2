//! Shared conversion-intent model.
//!
//! A background task retrains the networks on the newest stored samples and
//! publishes the result behind an `RwLock`. Handlers only ever read the
//! published `Arc<TrainedModels>`.
//!
//! The same task refreshes the audience averages over every stored sample,
//! which drive testimonial and recommendation picks.
//!
//! Training runs are serialized by an async mutex and each run takes a
//! generation ticket before it starts. A run publishes only if its ticket is
//! newer than the published model's, so a slow run can never replace the
//! output of a run that started after it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use nudge_core::behavior::{
    BehaviorAverages, BehaviorSample, DenseNetwork, FitOptions, NetworkError, TrainingProgress, TrainingSchedule,
    TrainingStep,
};

use crate::db::{BehaviorRepository, RepositoryError};

/// Epochs for the willingness-to-pay network.
const PRICING_EPOCHS: usize = 5;

/// The pricing network needs more than this many samples.
const PRICING_MIN_SAMPLES: usize = 3;

/// Errors from a training run.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("training failed: {0}")]
    Network(#[from] NetworkError),

    #[error("could not load samples: {0}")]
    Repository(#[from] RepositoryError),

    #[error("training task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Networks produced by one training run.
#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub intent: DenseNetwork,
    /// Absent until enough samples exist.
    pub pricing: Option<DenseNetwork>,
    pub sample_count: u64,
    pub step: usize,
    pub final_loss: f64,
    pub generation: u64,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModels {
    /// Conversion score in `[0, 1]`.
    #[must_use]
    pub fn score(&self, sample: &BehaviorSample) -> Option<f64> {
        self.intent.predict(&sample.intent_features()).ok()
    }

    /// Willingness to pay in `[0, 1]`, when the pricing network exists.
    #[must_use]
    pub fn willingness(&self, sample: &BehaviorSample) -> Option<f64> {
        self.pricing
            .as_ref()
            .and_then(|net| net.predict(&sample.pricing_features()).ok())
    }
}

/// Handle to the shared model.
#[derive(Clone)]
pub struct IntentService {
    inner: Arc<IntentInner>,
}

struct IntentInner {
    schedule: TrainingSchedule,
    published: RwLock<Option<Arc<TrainedModels>>>,
    audience: RwLock<Option<BehaviorAverages>>,
    run_lock: Mutex<()>,
    next_generation: AtomicU64,
    training: AtomicBool,
}

impl Default for IntentService {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(IntentInner {
                schedule: TrainingSchedule::standard(),
                published: RwLock::new(None),
                audience: RwLock::new(None),
                run_lock: Mutex::new(()),
                next_generation: AtomicU64::new(1),
                training: AtomicBool::new(false),
            }),
        }
    }

    /// The most recently published models.
    #[must_use]
    pub fn current(&self) -> Option<Arc<TrainedModels>> {
        self.inner
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Averages over all stored samples as of the last refresh.
    #[must_use]
    pub fn audience(&self) -> Option<BehaviorAverages> {
        *self
            .inner
            .audience
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_audience(&self, averages: Option<BehaviorAverages>) {
        *self
            .inner
            .audience
            .write()
            .unwrap_or_else(PoisonError::into_inner) = averages;
    }

    #[must_use]
    pub fn is_training(&self) -> bool {
        self.inner.training.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn schedule(&self) -> &TrainingSchedule {
        &self.inner.schedule
    }

    /// Schedule position for the published model, or for zero samples.
    #[must_use]
    pub fn progress(&self) -> TrainingProgress {
        let count = self.current().map_or(0, |m| m.sample_count);
        self.inner.schedule.progress(count)
    }

    /// Train on `samples` and publish the result.
    ///
    /// `total` is the number of samples stored overall; it picks the schedule
    /// step and decides whether anything changed since the last publish.
    /// `samples` may be a capped subset of them.
    ///
    /// Returns the published models, or `None` when the run was skipped
    /// (no samples, total unchanged since the last publish) or lost to a newer
    /// run.
    ///
    /// # Errors
    ///
    /// Returns `IntentError` if fitting fails or the blocking task panics.
    #[instrument(skip_all, fields(samples = samples.len(), total = total))]
    pub async fn retrain(
        &self,
        samples: Vec<BehaviorSample>,
        total: u64,
    ) -> Result<Option<Arc<TrainedModels>>, IntentError> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::AcqRel);
        let _guard = self.inner.run_lock.lock().await;

        if samples.is_empty() {
            debug!("No samples yet, skipping retrain");
            return Ok(None);
        }
        if self.current().is_some_and(|m| m.sample_count == total) {
            debug!(total, "Sample count unchanged, skipping retrain");
            return Ok(None);
        }
        let Some(step) = self.inner.schedule.step_for(total).copied() else {
            debug!("No schedule step reached, skipping retrain");
            return Ok(None);
        };

        self.inner.training.store(true, Ordering::Release);
        let result = tokio::task::spawn_blocking(move || {
            let mut rng = rand::rng();
            train(&samples, total, step, generation, &mut rng)
        })
        .await;
        self.inner.training.store(false, Ordering::Release);

        let models = Arc::new(result??);
        Ok(self.publish(models))
    }

    /// Refresh the audience averages, then load the newest samples and
    /// retrain.
    ///
    /// # Errors
    ///
    /// Returns `IntentError` if loading or training fails.
    pub async fn retrain_from_db(
        &self,
        pool: &PgPool,
        max_samples: i64,
    ) -> Result<Option<Arc<TrainedModels>>, IntentError> {
        let repo = BehaviorRepository::new(pool);
        let total = u64::try_from(repo.count().await?).unwrap_or_default();
        if self.audience().map_or(0, |a| a.sample_count) != total {
            self.set_audience(repo.averages().await?);
        }
        if self.current().is_some_and(|m| m.sample_count == total) {
            debug!(total, "Sample count unchanged, skipping retrain");
            return Ok(None);
        }
        let samples = repo.training_set(max_samples).await?;
        self.retrain(samples, total).await
    }

    fn publish(&self, models: Arc<TrainedModels>) -> Option<Arc<TrainedModels>> {
        let mut published = self
            .inner
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if published
            .as_ref()
            .is_some_and(|current| current.generation >= models.generation)
        {
            debug!(generation = models.generation, "Newer model already published");
            return None;
        }

        info!(
            generation = models.generation,
            samples = models.sample_count,
            step = models.step,
            loss = models.final_loss,
            "Published intent model"
        );
        *published = Some(Arc::clone(&models));
        Some(models)
    }
}

/// Fit fresh networks for `step` on `samples`, recording `total` as the
/// sample count they represent.
///
/// # Errors
///
/// Returns `NetworkError` if `samples` is empty.
pub fn train<R: rand::Rng + ?Sized>(
    samples: &[BehaviorSample],
    total: u64,
    step: TrainingStep,
    generation: u64,
    rng: &mut R,
) -> Result<TrainedModels, NetworkError> {
    let xs: Vec<_> = samples.iter().map(BehaviorSample::intent_features).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.converted).collect();

    let mut intent = DenseNetwork::intent(rng);
    let report = intent.fit(
        &xs,
        &ys,
        FitOptions {
            epochs: step.epochs,
            batch_size: TrainingSchedule::batch_size(samples.len()),
            ..FitOptions::default()
        },
        rng,
    )?;

    let pricing = if samples.len() > PRICING_MIN_SAMPLES {
        let xs: Vec<_> = samples.iter().map(BehaviorSample::pricing_features).collect();
        let ys: Vec<f64> = samples.iter().map(BehaviorSample::engagement_label).collect();
        let mut pricing = DenseNetwork::pricing(rng);
        pricing.fit(
            &xs,
            &ys,
            FitOptions {
                epochs: PRICING_EPOCHS,
                batch_size: TrainingSchedule::batch_size(samples.len()),
                ..FitOptions::default()
            },
            rng,
        )?;
        Some(pricing)
    } else {
        None
    };

    Ok(TrainedModels {
        intent,
        pricing,
        sample_count: total,
        step: step.index,
        final_loss: report.final_loss,
        generation,
        trained_at: Utc::now(),
    })
}

/// Spawn the periodic retrain task. The first run starts immediately.
pub fn spawn_retrain_task(
    service: IntentService,
    pool: PgPool,
    interval: Duration,
    max_samples: i64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting intent retrain task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = service.retrain_from_db(&pool, max_samples).await {
                        warn!(error = %e, "Intent retrain failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Intent retrain task stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn samples(n: usize) -> Vec<BehaviorSample> {
        (0..n)
            .map(|i| {
                let engaged = i % 2 == 0;
                BehaviorSample {
                    scroll: if engaged { 0.9 } else { 0.1 },
                    time: if engaged { 20_000.0 } else { 2_000.0 },
                    clicks: if engaged { 10.0 } else { 1.0 },
                    cta_seen: 1.0,
                    converted: if engaged { 1.0 } else { 0.0 },
                }
            })
            .collect()
    }

    #[test]
    fn test_train_skips_pricing_with_few_samples() {
        let mut rng = StdRng::seed_from_u64(7);
        let schedule = TrainingSchedule::standard();
        let step = *schedule.step_for(3).unwrap();
        let models = train(&samples(3), 3, step, 1, &mut rng).unwrap();

        assert!(models.pricing.is_none());
        assert_eq!(models.sample_count, 3);
        let score = models.score(&samples(1)[0]).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_train_builds_pricing_with_enough_samples() {
        let mut rng = StdRng::seed_from_u64(7);
        let schedule = TrainingSchedule::standard();
        let step = *schedule.step_for(12).unwrap();
        let models = train(&samples(12), 12, step, 1, &mut rng).unwrap();

        assert!(models.pricing.is_some());
        assert!(models.willingness(&samples(1)[0]).is_some());
    }

    #[tokio::test]
    async fn test_retrain_publishes_and_skips_unchanged_count() {
        let service = IntentService::new();
        assert!(service.current().is_none());
        assert_eq!(service.progress().step, None);

        let first = service.retrain(samples(10), 10).await.unwrap();
        assert!(first.is_some());
        assert_eq!(service.current().unwrap().sample_count, 10);
        assert!(!service.is_training());

        let second = service.retrain(samples(10), 10).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_retrain_empty_is_skipped() {
        let service = IntentService::new();
        assert!(service.retrain(Vec::new(), 0).await.unwrap().is_none());
        assert!(service.current().is_none());
    }

    #[test]
    fn test_stale_generation_not_published() {
        let service = IntentService::new();
        let mut rng = StdRng::seed_from_u64(1);
        let step = *service.schedule().step_for(5).unwrap();

        let newer = Arc::new(train(&samples(5), 5, step, 9, &mut rng).unwrap());
        let older = Arc::new(train(&samples(6), 6, step, 4, &mut rng).unwrap());

        assert!(service.publish(newer).is_some());
        assert!(service.publish(older).is_none());
        assert_eq!(service.current().unwrap().generation, 9);
    }
}
