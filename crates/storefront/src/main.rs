//! Nudge Storefront - Behavior-aware shop backend.
//!
//! This binary serves the storefront API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API plus protected page data
//! - Product catalog loaded from YAML at startup
//! - `PostgreSQL` for accounts, orders, carts (sessions) and behavior samples
//! - Shared conversion-intent model retrained in the background
//! - Server-Sent Events relay for the admin dashboard
//!
//! # Background tasks
//!
//! - Behavior window flush (`STOREFRONT_BEHAVIOR_FLUSH_SECS`)
//! - Intent model retrain (`STOREFRONT_INTENT_RETRAIN_SECS`)
//! - Realtime `LISTEN` relay when `STOREFRONT_REALTIME_FANOUT=postgres`
//!
//! All three stop on the shutdown signal; the flush task writes the last
//! window before exiting.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;

use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nudge_storefront::catalog::Catalog;
use nudge_storefront::config::{FanoutMode, StorefrontConfig};
use nudge_storefront::services::{behavior, intent, realtime};
use nudge_storefront::state::AppState;
use nudge_storefront::{app, db};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nudge_storefront=info,tower_http=debug".into());

    // JSON lines for log shipping, text locally
    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p nudge-cli -- migrate

    let catalog = Catalog::load(&config.catalog_path).expect("Failed to load product catalog");
    tracing::info!(products = catalog.len(), path = %config.catalog_path.display(), "Catalog loaded");

    let state = AppState::new(config.clone(), pool.clone(), catalog)
        .expect("Failed to initialize application state");

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = vec![
        behavior::spawn_flush_task(
            state.aggregator().clone(),
            pool.clone(),
            config.behavior.flush_interval,
            shutdown_rx.clone(),
        ),
        intent::spawn_retrain_task(
            state.intent().clone(),
            pool.clone(),
            config.intent.retrain_interval,
            config.intent.max_training_samples,
            shutdown_rx.clone(),
        ),
    ];
    if config.realtime.fanout == FanoutMode::Postgres {
        tasks.push(realtime::spawn_listener(
            state.realtime().clone(),
            pool.clone(),
            shutdown_rx.clone(),
        ));
    }

    let hub = state.realtime().clone();
    let app = app(state);

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Open SSE streams would otherwise hold the server open
        hub.close();
    })
    .await
    .expect("Server error");

    // Stop background tasks and wait for the final flush
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }
    tracing::info!("Shutdown complete");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
