//! A single interaction sample posted by the browser.

use serde::{Deserialize, Deserializer, Serialize};

/// Width of [`BehaviorSample::intent_features`].
pub const INTENT_FEATURES: usize = 4;

/// Width of [`BehaviorSample::pricing_features`].
pub const PRICING_FEATURES: usize = 3;

/// Scroll, time and click signals from one browser session.
///
/// The browser sends partial objects (`{"scroll":0.4,"time":5300}`) and
/// serializes `NaN` as `null`, so every field defaults to zero when it is
/// missing or null. Call [`sanitized`](Self::sanitized) before storing
/// or training on a sample that came over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorSample {
    /// Scrolled fraction of the page, 0..=1.
    #[serde(deserialize_with = "null_as_zero")]
    pub scroll: f64,
    /// Milliseconds since the page loaded.
    #[serde(deserialize_with = "null_as_zero")]
    pub time: f64,
    /// Clicks in the session so far.
    #[serde(deserialize_with = "null_as_zero")]
    pub clicks: f64,
    /// 1 once the call-to-action has been on screen.
    #[serde(deserialize_with = "null_as_zero")]
    pub cta_seen: f64,
    /// 1 once the visitor added to cart or bought. Training label.
    #[serde(deserialize_with = "null_as_zero")]
    pub converted: f64,
}

impl BehaviorSample {
    /// Clamp every field into its meaningful range.
    ///
    /// Non-finite values become 0, `scroll` is clamped into `[0, 1]`, counts
    /// and durations are floored at 0 and the flags collapse to 0 or 1.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            scroll: finite_or_zero(self.scroll).clamp(0.0, 1.0),
            time: finite_or_zero(self.time).max(0.0),
            clicks: finite_or_zero(self.clicks).max(0.0),
            cta_seen: flag(self.cta_seen),
            converted: flag(self.converted),
        }
    }

    /// Inputs for the conversion-intent network:
    /// `[scroll, time / 30s, clicks / 20, cta_seen]`.
    #[must_use]
    pub fn intent_features(&self) -> [f64; INTENT_FEATURES] {
        [
            self.scroll,
            self.time / 30_000.0,
            self.clicks / 20.0,
            self.cta_seen,
        ]
    }

    /// Inputs for the willingness-to-pay network:
    /// `[scroll, time / 10s, clicks / 10]`.
    #[must_use]
    pub fn pricing_features(&self) -> [f64; PRICING_FEATURES] {
        [self.scroll, self.time / 10_000.0, self.clicks / 10.0]
    }

    /// Label for the pricing network: a visitor who scrolled past 70 %, stayed
    /// over 15 s and clicked more than 8 times is treated as willing to pay.
    #[must_use]
    pub fn engagement_label(&self) -> f64 {
        if self.scroll > 0.7 && self.time > 15_000.0 && self.clicks > 8.0 {
            1.0
        } else {
            0.0
        }
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn flag(value: f64) -> f64 {
    if finite_or_zero(value) > 0.0 { 1.0 } else { 0.0 }
}
