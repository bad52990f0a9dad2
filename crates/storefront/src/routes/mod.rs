//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Pages (JSON; redirect to /login when signed out)
//! GET   /checkout                     - Cart summary and payment widget id
//! GET   /dashboard                    - Profile and orders
//! GET   /admin                        - Order totals, behavior window, model status (admin)
//!
//! # Auth
//! POST  /api/auth/register            - Create account
//! POST  /api/auth/login               - Set authToken cookie
//! POST  /api/auth/logout              - Clear authToken cookie
//! GET   /api/auth/me                  - Current profile
//!
//! # Catalog and cart
//! GET   /api/products                 - Product list
//! GET   /api/products/{id}            - Product detail
//! GET   /api/products/{id}/price      - Behavior-adjusted price
//! GET   /api/cart                     - Cart
//! POST  /api/cart/add                 - Add product
//! POST  /api/cart/update              - Set quantity (0 removes)
//! POST  /api/cart/remove              - Remove product
//! POST  /api/cart/clear               - Empty cart
//! GET   /api/cart/count               - Item count
//!
//! # Orders
//! POST  /api/create-order             - Record a payment-widget order
//! POST  /api/complete-order           - Attach shipping details
//! GET   /api/orders                   - Caller's orders
//! POST  /api/orders                   - Place an order
//! POST  /api/orders/{id}/items        - Append items
//! GET   /api/admin/orders             - All orders (admin)
//! PATCH /api/admin/orders/{id}/status - Advance status (admin)
//!
//! # Behavior and intent
//! POST  /api/behavior                 - Store a sample
//! GET   /api/behavior                 - Stored samples, newest first
//! GET   /api/behavior/summary         - Current window averages
//! POST  /api/intent/score             - Conversion score and messaging
//! GET   /api/testimonial              - Testimonial for the audience
//! GET   /api/recommendations          - Recommended products
//! GET   /api/social-proof             - Social proof notice
//!
//! # Realtime
//! GET   /api/realtime                 - SSE stream (admin)
//! POST  /api/realtime                 - Relay an event
//! GET   /api/realtime/recent          - Recent sample events (admin)
//! ```

pub mod auth;
pub mod behavior;
pub mod cart;
pub mod intent;
pub mod orders;
pub mod pages;
pub mod products;
pub mod realtime;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::config::StorefrontConfig;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Register and login are rate limited when `rate_limit` is set.
pub fn auth_routes(rate_limit: bool) -> Router<AppState> {
    let mut credentials = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));
    if rate_limit {
        credentials = credentials.layer(auth_rate_limiter());
    }

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(credentials)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/price", get(intent::price))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(orders::create_from_widget))
        .route("/complete-order", post(orders::complete))
        .route("/orders", get(orders::list_mine).post(orders::place))
        .route("/orders/{id}/items", post(orders::add_items))
        .route("/admin/orders", get(orders::list_all))
        .route("/admin/orders/{id}/status", patch(orders::update_status))
}

/// Create the behavior, intent and realtime routes router.
///
/// The two ingest endpoints browsers post to continuously are rate limited
/// when `rate_limit` is set.
pub fn behavior_routes(rate_limit: bool) -> Router<AppState> {
    let mut ingest = Router::new()
        .route("/behavior", post(behavior::record))
        .route("/realtime", post(realtime::publish));
    if rate_limit {
        ingest = ingest.layer(api_rate_limiter());
    }

    Router::new()
        .route("/behavior", get(behavior::list))
        .route("/behavior/summary", get(behavior::summary))
        .route("/realtime", get(realtime::stream))
        .route("/realtime/recent", get(realtime::recent))
        .route("/intent/score", post(intent::score))
        .route("/testimonial", get(intent::testimonial))
        .route("/recommendations", get(intent::recommendations))
        .route("/social-proof", get(intent::social_proof_notice))
        .merge(ingest)
}

/// Create all routes for the storefront.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    let rate_limit = config.rate_limit_enabled;

    Router::new()
        // Protected pages
        .route("/checkout", get(pages::checkout))
        .route("/dashboard", get(pages::dashboard))
        .route("/admin", get(pages::admin))
        // API
        .nest("/api/auth", auth_routes(rate_limit))
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api", order_routes().merge(behavior_routes(rate_limit)))
}
