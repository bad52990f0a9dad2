//! Live behavior stream for the admin dashboard.
//!
//! Storefront pages post small JSON events; every connected admin receives
//! them over Server-Sent Events, tagged with the visitor's country flag.

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures::Stream;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use crate::error::{ApiJson, AppError, Result};
use crate::middleware::{ClientIp, RequireAdmin};
use crate::state::AppState;

/// Open an event stream. The first event is `{"type":"connected","ts":...}`.
pub async fn stream(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut receiver = state.realtime().subscribe();
    let closed = state.realtime().closed();
    tracing::info!(user_id = %admin.id, "Admin joined realtime stream");

    let connected = json!({ "type": "connected", "ts": Utc::now().timestamp_millis() });

    let events = async_stream::stream! {
        yield Ok(Event::default().data(connected.to_string()));

        tokio::pin!(closed);
        loop {
            let received = tokio::select! {
                received = receiver.recv() => received,
                () = &mut closed => break,
            };
            match received {
                Ok(payload) => yield Ok(Event::default().data(payload)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime subscriber lagged, events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Relay an event to every admin stream.
pub async fn publish(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Value>> {
    let Value::Object(mut event) = body else {
        return Err(AppError::BadRequest("Event must be a JSON object".to_string()));
    };

    let country = state.geo().flag_for(ip).await;
    event.insert("country".to_string(), Value::String(country));
    event.insert("ts".to_string(), json!(Utc::now().timestamp_millis()));

    state.realtime().publish(Value::Object(event)).await;

    Ok(Json(json!({ "ok": true })))
}

/// Recent sample-bearing events, oldest first.
pub async fn recent(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Json<Vec<Value>> {
    Json(state.realtime().recent())
}
