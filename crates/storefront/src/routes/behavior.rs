//! Behavior sample ingest and read-back.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use nudge_core::behavior::BehaviorSample;

use crate::db::BehaviorRepository;
use crate::db::behavior::StoredSample;
use crate::error::{ApiJson, Result};
use crate::services::AggregateSnapshot;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// Store a sample and fold it into the running window.
#[instrument(skip_all)]
pub async fn record(
    State(state): State<AppState>,
    ApiJson(sample): ApiJson<BehaviorSample>,
) -> Result<&'static str> {
    let sample = sample.sanitized();
    let id = BehaviorRepository::new(state.pool()).insert(&sample).await?;
    state.aggregator().record(&sample);

    tracing::debug!(sample_id = %id, "Behavior sample stored");
    Ok("ok")
}

/// Stored samples, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoredSample>>> {
    let limit = effective_limit(query.limit, state.config().behavior.list_limit);
    let samples = BehaviorRepository::new(state.pool())
        .list_recent(limit)
        .await?;
    Ok(Json(samples))
}

/// Averages of the window that has not been flushed yet.
pub async fn summary(State(state): State<AppState>) -> Json<AggregateSnapshot> {
    Json(state.aggregator().snapshot())
}

/// `requested` clamped into `1..=max`, defaulting to `max`.
fn effective_limit(requested: Option<i64>, max: i64) -> i64 {
    let max = max.max(1);
    requested.map_or(max, |limit| limit.clamp(1, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None, 1000), 1000);
        assert_eq!(effective_limit(Some(20), 1000), 20);
        assert_eq!(effective_limit(Some(5000), 1000), 1000);
        assert_eq!(effective_limit(Some(0), 1000), 1);
        assert_eq!(effective_limit(Some(-3), 1000), 1);
    }
}
