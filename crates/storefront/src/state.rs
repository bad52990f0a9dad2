//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::catalog::Catalog;
use crate::config::{FanoutMode, StorefrontConfig};
use crate::services::geo::GeoError;
use crate::services::{BehaviorAggregator, GeoLocator, IntentService, RealtimeHub, TokenKeys};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: Catalog,
    token_keys: TokenKeys,
    aggregator: BehaviorAggregator,
    intent: IntentService,
    realtime: RealtimeHub,
    geo: GeoLocator,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Nothing here touches the database; background tasks are started
    /// separately by the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the geo lookup HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool, catalog: Catalog) -> Result<Self, GeoError> {
        let token_keys = TokenKeys::new(&config.jwt_secret);
        let realtime = match config.realtime.fanout {
            FanoutMode::Local => RealtimeHub::local(),
            FanoutMode::Postgres => RealtimeHub::postgres(pool.clone()),
        };
        let geo = GeoLocator::new(config.realtime.geo_lookup_url.clone())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                token_keys,
                aggregator: BehaviorAggregator::new(),
                intent: IntentService::new(),
                realtime,
                geo,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Signing and verification keys for the `authToken` cookie.
    #[must_use]
    pub fn token_keys(&self) -> &TokenKeys {
        &self.inner.token_keys
    }

    /// Running behavior window for this instance.
    #[must_use]
    pub fn aggregator(&self) -> &BehaviorAggregator {
        &self.inner.aggregator
    }

    #[must_use]
    pub fn intent(&self) -> &IntentService {
        &self.inner.intent
    }

    #[must_use]
    pub fn realtime(&self) -> &RealtimeHub {
        &self.inner.realtime
    }

    #[must_use]
    pub fn geo(&self) -> &GeoLocator {
        &self.inner.geo
    }
}
