//! Database migration commands.
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in the
//! storefront crate. The session store keeps its own table, created here too,
//! so the server never has to migrate on startup.

use tower_sessions_sqlx_store::PostgresStore;

use nudge_storefront::db::MIGRATOR;

use super::connect;

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] super::CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store migration error: {0}")]
    SessionStore(#[from] sqlx::Error),
}

/// Run storefront migrations and create the session table.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Creating session store table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
