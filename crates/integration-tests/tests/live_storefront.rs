//! End-to-end flows against a running storefront.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//!   (`cargo run -p nudge-cli -- migrate`)
//! - The storefront running (`cargo run -p nudge-storefront`)
//!   with `STOREFRONT_RATE_LIMIT=false`
//!
//! Run with: `cargo test -p nudge-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the storefront (configurable via environment).
fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that keeps the `authToken` and session cookies between calls.
fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Register a fresh customer and log in. Returns the email used.
async fn signed_in_customer(client: &Client) -> String {
    let base_url = storefront_base_url();
    let email = format!("shopper-{}@example.com", Uuid::new_v4());

    let resp = client
        .post(format!("{base_url}/api/auth/register"))
        .json(&json!({ "email": email, "password": "correct horse battery", "name": "Test Shopper" }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{base_url}/api/auth/login"))
        .json(&json!({ "email": email, "password": "correct horse battery" }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);

    email
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_readiness() {
    let resp = client()
        .get(format!("{}/health/ready", storefront_base_url()))
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_register_login_me() {
    let client = client();
    let email = signed_in_customer(&client).await;

    let me: Value = client
        .get(format!("{}/api/auth/me", storefront_base_url()))
        .send()
        .await
        .expect("Failed to fetch profile")
        .json()
        .await
        .expect("Invalid JSON");

    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "customer");
    assert_eq!(me["name"], "Test Shopper");
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_duplicate_registration_conflicts() {
    let client = client();
    let email = signed_in_customer(&client).await;

    let resp = client
        .post(format!("{}/api/auth/register", storefront_base_url()))
        .json(&json!({ "email": email, "password": "another password" }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_wrong_password_is_401() {
    let client = client();
    let email = signed_in_customer(&client).await;

    let resp = client
        .post(format!("{}/api/auth/login", storefront_base_url()))
        .json(&json!({ "email": email, "password": "not the password" }))
        .send()
        .await
        .expect("Failed to log in");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Cart & Orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_cart_to_order_flow() {
    let client = client();
    let base_url = storefront_base_url();
    signed_in_customer(&client).await;

    let products: Vec<Value> = client
        .get(format!("{base_url}/api/products"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid JSON");
    let product = &products[0];

    let cart: Value = client
        .post(format!("{base_url}/api/cart/add"))
        .json(&json!({ "productId": product["id"], "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add to cart")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(cart["itemCount"], 2);

    let count: Value = client
        .get(format!("{base_url}/api/cart/count"))
        .send()
        .await
        .expect("Failed to count cart")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(count["itemCount"], 2);

    let resp = client
        .post(format!("{base_url}/api/orders"))
        .json(&json!({
            "items": [
                { "name": product["name"], "price": product["price"] },
                { "name": product["name"], "price": product["price"] },
            ],
            "paymentMethod": "transfer",
            "paymentProof": "receipt-001",
        }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));

    // Placing the order empties the cart
    let count: Value = client
        .get(format!("{base_url}/api/cart/count"))
        .send()
        .await
        .expect("Failed to count cart")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(count["itemCount"], 0);

    let mine: Vec<Value> = client
        .get(format!("{base_url}/api/orders"))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_widget_order_then_complete() {
    let client = client();
    let base_url = storefront_base_url();

    let reference = format!("PP-{}", Uuid::new_v4());

    let created: Value = client
        .post(format!("{base_url}/api/create-order"))
        .json(&json!({
            "productId": "calm-tea",
            "productName": "Calm Tea",
            "price": "12.50",
            "paypalOrderId": reference,
            "payerEmail": "payer@example.com",
        }))
        .send()
        .await
        .expect("Failed to create order")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(created["success"], true);

    let resp = client
        .post(format!("{base_url}/api/complete-order"))
        .json(&json!({
            "orderId": created["orderId"],
            "name": "Test Payer",
            "address": "1 Main St",
            "city": "Springfield",
            "department": "Central",
            "whatsappNumber": "+15550100",
        }))
        .send()
        .await
        .expect("Failed to complete order");
    assert_eq!(resp.status(), StatusCode::OK);

    // Another browser may only update it by quoting the provider order id.
    let shipping = json!({
        "orderId": created["orderId"],
        "name": "Someone Else",
        "address": "9 Side St",
        "city": "Shelbyville",
        "department": "North",
        "whatsappNumber": "+15550199",
    });
    let stranger = self::client();
    let resp = stranger
        .post(format!("{base_url}/api/complete-order"))
        .json(&shipping)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let mut quoted = shipping;
    quoted["paypalOrderId"] = json!(reference);
    let resp = stranger
        .post(format!("{base_url}/api/complete-order"))
        .json(&quoted)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Behavior
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_behavior_sample_is_stored_and_aggregated() {
    let client = client();
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/api/behavior"))
        .json(&json!({ "scroll": 0.6, "time": 12000, "clicks": 4, "ctaSeen": 1 }))
        .send()
        .await
        .expect("Failed to post sample");
    assert_eq!(resp.status(), StatusCode::OK);

    let summary: Value = client
        .get(format!("{base_url}/api/behavior/summary"))
        .send()
        .await
        .expect("Failed to fetch summary")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(summary["sampleCount"].as_u64().unwrap() >= 1);

    let stored: Vec<Value> = client
        .get(format!("{base_url}/api/behavior?limit=5"))
        .send()
        .await
        .expect("Failed to list samples")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(!stored.is_empty() && stored.len() <= 5);
}
