//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store, cart only)
//! 6. Rate limiting (governor), per route group
//!
//! Authentication is not a layer: handlers take [`RequireUser`],
//! [`RequireAdmin`] or [`OptionalUser`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    AuthRejection, CurrentUser, OptionalUser, RequireAdmin, RequireUser, auth_cookie,
    clear_auth_cookie,
};
pub use rate_limit::{ClientIp, api_rate_limiter, auth_rate_limiter, client_ip};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
