//! Scoring and personalization endpoints.
//!
//! Every visitor is scored against the one shared model trained from all
//! stored samples. Until the first training run finishes the endpoints
//! answer with neutral defaults: score 0, list prices, random picks.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use nudge_core::behavior::{
    BehaviorAverages, BehaviorSample, CtaOffer, PriceAdjustment, SocialProof, Testimonial, TrainingProgress,
    UrgencyTier, cta_for, price_for, recommend, select_testimonial, social_proof, urgency_for,
};

use crate::catalog::Product;
use crate::error::{ApiJson, AppError, Result};
use crate::services::TrainedModels;
use crate::state::AppState;

const DEFAULT_RECOMMENDATIONS: usize = 3;

// =============================================================================
// Score
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyView {
    pub tier: UrgencyTier,
    pub message: &'static str,
    pub cta: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaView {
    pub offer: CtaOffer,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    /// A trained model exists.
    pub ready: bool,
    /// A training run is in progress.
    pub training: bool,
    pub score: f64,
    pub level: &'static str,
    pub next_level: Option<&'static str>,
    pub samples_to_next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<UrgencyView>,
    pub cta: CtaView,
}

/// Conversion score and the messaging it selects.
pub async fn score(
    State(state): State<AppState>,
    ApiJson(sample): ApiJson<BehaviorSample>,
) -> Json<ScoreResponse> {
    let intent = state.intent();
    let models = intent.current();
    Json(build_score(
        models.as_deref(),
        &sample.sanitized(),
        intent.is_training(),
        intent.progress(),
    ))
}

fn build_score(
    models: Option<&TrainedModels>,
    sample: &BehaviorSample,
    training: bool,
    progress: TrainingProgress,
) -> ScoreResponse {
    let score = models.and_then(|m| m.score(sample));
    let offer = cta_for(score.unwrap_or(0.0));

    ScoreResponse {
        ready: score.is_some(),
        training,
        score: score.unwrap_or(0.0),
        level: progress.level,
        next_level: progress.next_level,
        samples_to_next: progress.samples_to_next,
        urgency: score.and_then(urgency_for).map(|tier| UrgencyView {
            tier,
            message: tier.message(),
            cta: tier.cta(),
        }),
        cta: CtaView {
            offer,
            label: offer.label(),
        },
    }
}

// =============================================================================
// Price
// =============================================================================

/// Behavior signals passed on the query string.
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub scroll: Option<f64>,
    pub time: Option<f64>,
    pub clicks: Option<f64>,
}

impl PriceQuery {
    fn sample(&self) -> BehaviorSample {
        BehaviorSample {
            scroll: self.scroll.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            clicks: self.clicks.unwrap_or_default(),
            ..BehaviorSample::default()
        }
        .sanitized()
    }
}

/// Price for a product adjusted by the visitor's estimated willingness to pay.
pub async fn price(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceAdjustment>> {
    let product = state
        .catalog()
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let willingness = state
        .intent()
        .current()
        .and_then(|models| models.willingness(&query.sample()));

    Ok(Json(price_for(product.price, willingness)))
}

// =============================================================================
// Testimonials, Recommendations, Social Proof
// =============================================================================

/// Averages over every stored sample, or over the unflushed window until the
/// first refresh has run.
fn audience_averages(state: &AppState) -> Option<BehaviorAverages> {
    prefer_stored(state.intent().audience(), state.aggregator().averages())
}

fn prefer_stored(
    stored: Option<BehaviorAverages>,
    window: Option<BehaviorAverages>,
) -> Option<BehaviorAverages> {
    stored.or(window)
}

pub async fn testimonial(State(state): State<AppState>) -> Json<Testimonial> {
    let averages = audience_averages(&state);
    Json(*select_testimonial(averages.as_ref(), &mut rand::rng()))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub n: Option<usize>,
}

pub async fn recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> Json<Vec<Product>> {
    let n = query.n.unwrap_or(DEFAULT_RECOMMENDATIONS);
    let averages = audience_averages(&state);
    let picked = recommend(
        state.catalog().products(),
        averages.as_ref(),
        n,
        &mut rand::rng(),
    );
    Json(picked.into_iter().cloned().collect())
}

pub async fn social_proof_notice() -> Json<SocialProof> {
    Json(social_proof(&mut rand::rng()))
}
