//! Sample-count driven training schedule.
//!
//! As samples accumulate the intent network moves up through 100 steps. Each
//! step unlocks at a sample threshold that grows by half each time and trains
//! for a few more epochs than the last. Steps carry a level name shown on the
//! admin dashboard.

use serde::Serialize;

/// Number of steps in the standard schedule.
pub const STEP_COUNT: usize = 100;

const MAX_EPOCHS: usize = 50;
const MAX_BATCH: usize = 8;

/// Names by step index; a step past the end reuses the last one.
const LEVELS: &[&str] = &[
    "Beginner",
    "Apprentice",
    "Novice",
    "Initiate",
    "Explorer",
    "Hobbyist",
    "Enthusiast",
    "Dedicated",
    "Committed",
    "Advanced",
    "Expert",
    "Master",
    "Guru",
    "Legend",
    "Mythic",
    "Divine",
    "Supreme",
    "Elite",
    "Champion",
    "Titan",
    "Colossus",
    "Giant",
    "Behemoth",
    "Leviathan",
    "Phenomenon",
    "Prodigy",
    "Genius",
    "Sage",
    "Oracle",
    "Visionary",
    "Innovator",
    "Pioneer",
    "Revolutionary",
    "Transformer",
    "Catalyst",
    "Architect",
    "Creator",
    "Artificer",
    "Forger",
    "Sculptor",
    "Alchemist",
    "Mage",
    "Sorcerer",
    "Necromancer",
    "Summoner",
    "Conjurer",
    "Illusionist",
    "Prestidigitator",
    "Thaumaturge",
    "Theurgist",
    "Shaman",
    "Druid",
    "Elementalist",
    "Death Mage",
    "Demonologist",
    "Angelologist",
    "Seraph",
    "Cherub",
    "Throne",
    "Dominion",
    "Virtue",
    "Power",
    "Principality",
    "Archangel",
    "Supreme Archangel",
    "Greater Seraph",
    "Greater Cherub",
    "Greater Throne",
    "Greater Dominion",
    "Greater Virtue",
    "Greater Power",
    "Greater Principality",
    "Greater Archangel",
    "God",
    "Supreme God",
    "Universal Creator",
    "Lord of All",
    "Omnipotent",
    "Almighty",
    "Infinite",
    "Eternal",
    "Absolute",
    "Supreme Being",
    "Supreme Entity",
    "Cosmic Being",
    "Cosmic Entity",
    "Universal Being",
    "Universal Entity",
    "Multiversal Being",
    "Multiversal Entity",
    "Omniversal Being",
    "Omniversal Entity",
    "Transcendental Being",
    "Transcendental Entity",
    "Metaphysical Being",
    "Metaphysical Entity",
    "Hyperdimensional Being",
    "Hyperdimensional Entity",
    "Ultradimensional Being",
    "Ultradimensional Entity",
    "Paradoxical Being",
    "Paradoxical Entity",
    "Quantum Being",
    "Quantum Entity",
];

/// One rung of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStep {
    pub index: usize,
    /// Samples needed before this step is reached.
    pub min_samples: u64,
    pub epochs: usize,
    pub level: &'static str,
}

/// Where a given sample count sits in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgress {
    /// `None` until the first sample arrives.
    pub step: Option<usize>,
    pub level: &'static str,
    pub next_level: Option<&'static str>,
    pub samples_to_next: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TrainingSchedule {
    steps: Vec<TrainingStep>,
}

impl Default for TrainingSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

impl TrainingSchedule {
    /// The 100-step schedule: step 0 needs one sample, step `i` needs
    /// `floor(10 · 1.5^(i-1))` and trains `min(50, 5 + 2i)` epochs.
    #[must_use]
    pub fn standard() -> Self {
        let steps = (0..STEP_COUNT)
            .map(|index| TrainingStep {
                index,
                min_samples: min_samples(index),
                epochs: (5 + 2 * index).min(MAX_EPOCHS),
                level: level_name(index),
            })
            .collect();
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[TrainingStep] {
        &self.steps
    }

    /// Highest step whose threshold `count` has reached.
    #[must_use]
    pub fn step_for(&self, count: u64) -> Option<&TrainingStep> {
        self.steps.iter().rev().find(|s| count >= s.min_samples)
    }

    #[must_use]
    pub fn progress(&self, count: u64) -> TrainingProgress {
        let current = self.step_for(count);
        let next = match current {
            Some(step) => self.steps.get(step.index + 1),
            None => self.steps.first(),
        };

        TrainingProgress {
            step: current.map(|s| s.index),
            level: current.map_or_else(|| level_name(0), |s| s.level),
            next_level: next.map(|s| s.level),
            samples_to_next: next.map(|s| s.min_samples.saturating_sub(count)),
        }
    }

    /// Mini-batch size used when training on `count` samples.
    #[must_use]
    pub fn batch_size(count: usize) -> usize {
        count.clamp(1, MAX_BATCH)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
fn min_samples(index: usize) -> u64 {
    if index == 0 {
        return 1;
    }
    let exponent = i32::try_from(index - 1).unwrap_or(i32::MAX);
    (10.0 * 1.5_f64.powi(exponent)).floor() as u64
}

fn level_name(index: usize) -> &'static str {
    LEVELS
        .get(index)
        .or_else(|| LEVELS.last())
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_and_epochs() {
        let schedule = TrainingSchedule::standard();
        let steps = schedule.steps();
        assert_eq!(steps.len(), STEP_COUNT);
        assert_eq!(steps[0].min_samples, 1);
        assert_eq!(steps[0].epochs, 5);
        assert_eq!(steps[1].min_samples, 10);
        assert_eq!(steps[2].min_samples, 15);
        assert_eq!(steps[3].min_samples, 22);
        assert_eq!(steps[4].min_samples, 33);
        assert_eq!(steps[10].epochs, 25);
        assert_eq!(steps[99].epochs, 50);
        assert!(steps.windows(2).all(|w| w[0].min_samples < w[1].min_samples));
    }

    #[test]
    fn test_level_names_clamp() {
        let schedule = TrainingSchedule::standard();
        assert_eq!(schedule.steps()[0].level, "Beginner");
        assert_eq!(schedule.steps()[99].level, "Ultradimensional Entity");
        assert_eq!(level_name(STEP_COUNT + 50), *LEVELS.last().unwrap());
    }

    #[test]
    fn test_every_step_has_its_own_level() {
        let schedule = TrainingSchedule::standard();
        let mut levels: Vec<&str> = schedule.steps().iter().map(|s| s.level).collect();
        levels.sort_unstable();
        levels.dedup();
        assert_eq!(levels.len(), STEP_COUNT);
        assert_eq!(schedule.steps()[53].level, "Death Mage");
    }

    #[test]
    fn test_progress_without_samples() {
        let progress = TrainingSchedule::standard().progress(0);
        assert_eq!(progress.step, None);
        assert_eq!(progress.level, "Beginner");
        assert_eq!(progress.next_level, Some("Beginner"));
        assert_eq!(progress.samples_to_next, Some(1));
    }

    #[test]
    fn test_progress_mid_schedule() {
        let progress = TrainingSchedule::standard().progress(12);
        assert_eq!(progress.step, Some(1));
        assert_eq!(progress.level, "Apprentice");
        assert_eq!(progress.next_level, Some("Novice"));
        assert_eq!(progress.samples_to_next, Some(3));
    }

    #[test]
    fn test_progress_at_last_step() {
        let schedule = TrainingSchedule::standard();
        let last = schedule.steps()[99].min_samples;
        let progress = schedule.progress(last);
        assert_eq!(progress.step, Some(99));
        assert_eq!(progress.next_level, None);
        assert_eq!(progress.samples_to_next, None);
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(TrainingSchedule::batch_size(3), 3);
        assert_eq!(TrainingSchedule::batch_size(500), 8);
        assert_eq!(TrainingSchedule::batch_size(0), 1);
    }
}
