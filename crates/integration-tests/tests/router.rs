//! In-process router tests.
//!
//! Every request here stays off the database: the harness pool is lazy and
//! points at a closed port.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use axum::body::BodyDataStream;
use axum::http::{StatusCode, header};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use nudge_core::UserRole;
use nudge_integration_tests::{get, post_json, send, test_app, test_state, token_for};

// ============================================================================
// Health & Middleware
// ============================================================================

#[tokio::test]
async fn test_health() {
    let resp = send(test_app(), get("/health", None)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!("ok"));
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let resp = send(test_app(), get("/health", None)).await;

    assert_eq!(resp.header("x-frame-options"), Some("DENY"));
    assert_eq!(resp.header("x-content-type-options"), Some("nosniff"));
    assert!(resp.header("x-request-id").is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let request = axum::http::Request::get("/health")
        .header("x-request-id", "edge-1234")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(test_app(), request).await;

    assert_eq!(resp.header("x-request-id"), Some("edge-1234"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let resp = send(test_app(), get("/api/nope", None)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_products_list() {
    let resp = send(test_app(), get("/api/products", None)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let products = resp.body.as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["id"], "calm-tea");
}

#[tokio::test]
async fn test_product_detail_and_missing() {
    let resp = send(test_app(), get("/api/products/focus-kit", None)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["name"], "Focus Kit");

    let resp = send(test_app(), get("/api/products/nope", None)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.body["error"].is_string());
}

#[tokio::test]
async fn test_price_without_model_is_list_price() {
    let resp = send(
        test_app(),
        get("/api/products/calm-tea/price?scroll=0.9&time=30000&clicks=12", None),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["basePrice"], resp.body["price"]);
    assert_eq!(resp.body["discountPercent"], 0);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_api_without_token_is_401() {
    let resp = send(test_app(), get("/api/orders", None)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_token_is_401() {
    let mut cookie = token_for(UserRole::Customer);
    cookie.push('x');
    let resp = send(test_app(), get("/api/orders", Some(&cookie))).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_page_without_token_redirects_to_login() {
    let resp = send(test_app(), get("/checkout", None)).await;

    assert!(resp.status.is_redirection());
    assert_eq!(resp.header("location"), Some("/login?redirect=%2Fcheckout"));
}

#[tokio::test]
async fn test_customer_is_kept_out_of_admin() {
    let cookie = token_for(UserRole::Customer);

    let resp = send(test_app(), get("/api/admin/orders", Some(&cookie))).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = send(test_app(), get("/admin", Some(&cookie))).await;
    assert!(resp.status.is_redirection());
    assert_eq!(resp.header("location"), Some("/"));
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let resp = send(test_app(), post_json("/api/auth/logout", "{}", None)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["success"], true);
    let cookie = resp.header("set-cookie").unwrap();
    assert!(cookie.starts_with("authToken="));
    assert!(cookie.contains("Max-Age=0"));
}

// ============================================================================
// Orders (validation happens before any query)
// ============================================================================

#[tokio::test]
async fn test_widget_order_missing_fields() {
    let body = r#"{"productId":"calm-tea","productName":"Calm Tea"}"#;
    let resp = send(test_app(), post_json("/api/create-order", body, None)).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], "Missing required fields");
}

#[tokio::test]
async fn test_complete_order_from_foreign_session_is_403() {
    let body = json!({
        "orderId": 1,
        "name": "Someone Else",
        "address": "9 Side St",
        "city": "Shelbyville",
        "department": "North",
        "whatsappNumber": "+15550199",
    })
    .to_string();
    let resp = send(test_app(), post_json("/api/complete-order", &body, None)).await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_complete_order_checks_fields_first() {
    let body = r#"{"orderId":1,"name":"Someone Else"}"#;
    let resp = send(test_app(), post_json("/api/complete-order", body, None)).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_order_rejects_empty_items() {
    let cookie = token_for(UserRole::Customer);
    let resp = send(
        test_app(),
        post_json("/api/orders", r#"{"items":[]}"#, Some(&cookie)),
    )
    .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_order_rejects_wrong_total() {
    let cookie = token_for(UserRole::Customer);
    let body = r#"{"items":[{"name":"Calm Tea","price":"12.50"}],"total":"99.00"}"#;
    let resp = send(test_app(), post_json("/api/orders", body, Some(&cookie))).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Behavior, Intent & Realtime
// ============================================================================

#[tokio::test]
async fn test_invalid_json_is_400() {
    let resp = send(test_app(), post_json("/api/intent/score", "{not json", None)).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body["error"].as_str().unwrap().starts_with("Invalid JSON"));
}

#[tokio::test]
async fn test_score_is_neutral_before_training() {
    let resp = send(
        test_app(),
        post_json("/api/intent/score", r#"{"scroll":0.9,"time":40000}"#, None),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["ready"], false);
    assert_eq!(resp.body["score"], 0.0);
    assert!(resp.body.get("urgency").is_none());
    assert!(resp.body["cta"]["label"].is_string());
}

#[tokio::test]
async fn test_score_accepts_null_fields() {
    let resp = send(
        test_app(),
        post_json(
            "/api/intent/score",
            r#"{"scroll":null,"time":4000,"clicks":1}"#,
            None,
        ),
    )
    .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["score"], 0.0);
}

#[tokio::test]
async fn test_behavior_summary_starts_empty() {
    let resp = send(test_app(), get("/api/behavior/summary", None)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["sampleCount"], 0);
    assert!(resp.body["averages"].is_null());
}

#[tokio::test]
async fn test_recommendations_and_testimonial() {
    let resp = send(test_app(), get("/api/recommendations?n=1", None)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body.as_array().unwrap().len(), 1);

    let resp = send(test_app(), get("/api/testimonial", None)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body["text"].is_string());

    let resp = send(test_app(), get("/api/social-proof", None)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body["message"].is_string());
}

#[tokio::test]
async fn test_realtime_publish_requires_object() {
    let resp = send(test_app(), post_json("/api/realtime", "[1,2,3]", None)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = send(
        test_app(),
        post_json("/api/realtime", r#"{"type":"cta_view"}"#, None),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["ok"], true);
}

#[tokio::test]
async fn test_realtime_recent_is_admin_only() {
    let resp = send(test_app(), get("/api/realtime/recent", None)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let cookie = token_for(UserRole::Admin);
    let resp = send(test_app(), get("/api/realtime/recent", Some(&cookie))).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!([]));
}

/// Read one SSE event and return its `data` payload as JSON.
async fn next_event(frames: &mut BodyDataStream) -> Value {
    let mut buffer = String::new();
    while !buffer.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .expect("event arrives in time")
            .expect("stream is still open")
            .unwrap();
        buffer.push_str(std::str::from_utf8(&chunk).unwrap());
    }
    let data = buffer
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .unwrap();
    serde_json::from_str(data.trim()).unwrap()
}

#[tokio::test]
async fn test_realtime_stream_relays_events_until_closed() {
    let state = test_state();
    let app = nudge_storefront::app(state.clone());
    let cookie = token_for(UserRole::Admin);

    let response = app
        .clone()
        .oneshot(get("/api/realtime", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let mut frames = response.into_body().into_data_stream();

    let connected = next_event(&mut frames).await;
    assert_eq!(connected["type"], "connected");
    assert!(connected["ts"].is_i64());

    let resp = send(
        app,
        post_json("/api/realtime", r#"{"type":"scroll","scroll":0.4}"#, None),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);

    let relayed = next_event(&mut frames).await;
    assert_eq!(relayed["type"], "scroll");
    assert_eq!(relayed["scroll"], 0.4);
    assert_eq!(relayed["country"], "\u{1f30d}");
    assert!(relayed["ts"].is_i64());

    state.realtime().close();
    let end = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("stream ends after close");
    assert!(end.is_none());
}

#[tokio::test]
async fn test_realtime_stream_is_admin_only() {
    let cookie = token_for(UserRole::Customer);
    let resp = send(test_app(), get("/api/realtime", Some(&cookie))).await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
