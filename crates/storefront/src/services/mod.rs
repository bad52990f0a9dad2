//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password accounts and signed `authToken` cookies
//! - `behavior` - Running behavior aggregate and its flush task
//! - `intent` - Shared conversion-intent model and its retrain task
//! - `realtime` - Fan-out of live events to admin streams
//! - `geo` - Client IP to country flag

pub mod auth;
pub mod behavior;
pub mod geo;
pub mod intent;
pub mod realtime;

pub use auth::{AuthError, AuthService, Claims, TokenKeys};
pub use behavior::{AggregateSnapshot, BehaviorAggregator};
pub use geo::GeoLocator;
pub use intent::{IntentService, TrainedModels};
pub use realtime::RealtimeHub;
