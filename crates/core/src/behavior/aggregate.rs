//! Running sums over behavior samples.
//!
//! The ingest endpoint folds every sample into a [`BehaviorAggregate`]; a
//! timer periodically [`take`](BehaviorAggregate::take)s the window and
//! persists it. If persisting fails the window is handed back with
//! [`restore`](BehaviorAggregate::restore) and merged into the next one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::sample::BehaviorSample;

/// Field-wise sums of every sample seen since `started_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorWindow {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub sample_count: u64,
    pub scroll_sum: f64,
    pub time_sum: f64,
    pub clicks_sum: f64,
    pub cta_seen_sum: f64,
    pub converted_sum: f64,
}

impl BehaviorWindow {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    #[must_use]
    pub fn averages(&self) -> Option<BehaviorAverages> {
        BehaviorAverages::from_sums(
            self.sample_count,
            self.scroll_sum,
            self.time_sum,
            self.clicks_sum,
            self.cta_seen_sum,
            self.converted_sum,
        )
    }
}

/// Mean of each field over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorAverages {
    pub sample_count: u64,
    pub scroll: f64,
    pub time: f64,
    pub clicks: f64,
    pub cta_seen_rate: f64,
    pub conversion_rate: f64,
}

impl BehaviorAverages {
    /// Build averages from sums. Returns `None` when `count` is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // sample counts stay far below 2^52
    pub fn from_sums(
        count: u64,
        scroll: f64,
        time: f64,
        clicks: f64,
        cta_seen: f64,
        converted: f64,
    ) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Self {
            sample_count: count,
            scroll: scroll / n,
            time: time / n,
            clicks: clicks / n,
            cta_seen_rate: cta_seen / n,
            conversion_rate: converted / n,
        })
    }

    /// Averages over an in-memory slice.
    #[must_use]
    pub fn of(samples: &[BehaviorSample]) -> Option<Self> {
        let mut aggregate = BehaviorAggregate::new(Utc::now());
        for sample in samples {
            aggregate.record(sample);
        }
        aggregate.averages()
    }
}

/// In-memory accumulator for the current window.
#[derive(Debug, Clone)]
pub struct BehaviorAggregate {
    window: BehaviorWindow,
}

impl BehaviorAggregate {
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            window: empty_window(started_at),
        }
    }

    /// Fold one sample into the window.
    pub fn record(&mut self, sample: &BehaviorSample) {
        let w = &mut self.window;
        w.sample_count += 1;
        w.scroll_sum += sample.scroll;
        w.time_sum += sample.time;
        w.clicks_sum += sample.clicks;
        w.cta_seen_sum += sample.cta_seen;
        w.converted_sum += sample.converted;
    }

    #[must_use]
    pub const fn sample_count(&self) -> u64 {
        self.window.sample_count
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.window.started_at
    }

    #[must_use]
    pub fn averages(&self) -> Option<BehaviorAverages> {
        self.window.averages()
    }

    /// Close the current window at `now` and start a fresh one.
    pub fn take(&mut self, now: DateTime<Utc>) -> BehaviorWindow {
        let mut closed = std::mem::replace(&mut self.window, empty_window(now));
        closed.ended_at = now;
        closed
    }

    /// Merge a window that could not be persisted back into the current one.
    ///
    /// The merged window keeps the earlier start time.
    pub fn restore(&mut self, window: BehaviorWindow) {
        let w = &mut self.window;
        w.started_at = w.started_at.min(window.started_at);
        w.sample_count += window.sample_count;
        w.scroll_sum += window.scroll_sum;
        w.time_sum += window.time_sum;
        w.clicks_sum += window.clicks_sum;
        w.cta_seen_sum += window.cta_seen_sum;
        w.converted_sum += window.converted_sum;
    }
}

const fn empty_window(started_at: DateTime<Utc>) -> BehaviorWindow {
    BehaviorWindow {
        started_at,
        ended_at: started_at,
        sample_count: 0,
        scroll_sum: 0.0,
        time_sum: 0.0,
        clicks_sum: 0.0,
        cta_seen_sum: 0.0,
        converted_sum: 0.0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sample(scroll: f64, time: f64, clicks: f64) -> BehaviorSample {
        BehaviorSample {
            scroll,
            time,
            clicks,
            ..BehaviorSample::default()
        }
    }

    #[test]
    fn test_empty_aggregate_has_no_averages() {
        let aggregate = BehaviorAggregate::new(Utc::now());
        assert!(aggregate.averages().is_none());
    }

    #[test]
    fn test_averages() {
        let mut aggregate = BehaviorAggregate::new(Utc::now());
        aggregate.record(&sample(0.2, 1_000.0, 2.0));
        aggregate.record(&sample(0.6, 3_000.0, 4.0));

        let avg = aggregate.averages().unwrap();
        assert_eq!(avg.sample_count, 2);
        assert!((avg.scroll - 0.4).abs() < 1e-12);
        assert!((avg.time - 2_000.0).abs() < 1e-9);
        assert!((avg.clicks - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_take_resets_window() {
        let start = Utc::now();
        let mut aggregate = BehaviorAggregate::new(start);
        aggregate.record(&sample(0.5, 10.0, 1.0));

        let later = start + Duration::hours(24);
        let window = aggregate.take(later);

        assert_eq!(window.sample_count, 1);
        assert_eq!(window.started_at, start);
        assert_eq!(window.ended_at, later);
        assert_eq!(aggregate.sample_count(), 0);
        assert_eq!(aggregate.started_at(), later);
    }

    #[test]
    fn test_restore_merges_failed_window() {
        let start = Utc::now();
        let mut aggregate = BehaviorAggregate::new(start);
        aggregate.record(&sample(0.5, 10.0, 1.0));
        let failed = aggregate.take(start + Duration::hours(1));

        aggregate.record(&sample(0.1, 20.0, 3.0));
        aggregate.restore(failed);

        assert_eq!(aggregate.sample_count(), 2);
        assert_eq!(aggregate.started_at(), start);
        let avg = aggregate.averages().unwrap();
        assert!((avg.clicks - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_averages_of_slice() {
        assert!(BehaviorAverages::of(&[]).is_none());
        let avg = BehaviorAverages::of(&[sample(1.0, 0.0, 0.0), sample(0.0, 0.0, 0.0)]).unwrap();
        assert!((avg.scroll - 0.5).abs() < 1e-12);
    }
}
