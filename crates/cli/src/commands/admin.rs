//! Admin account management commands.
//!
//! Admins are ordinary storefront accounts with the `admin` role; they sign in
//! through the same login endpoint as customers.

use nudge_core::{Email, UserRole};
use nudge_storefront::db::RepositoryError;
use nudge_storefront::db::users::UserRepository;
use nudge_storefront::models::UserProfile;
use nudge_storefront::services::{AuthError, AuthService};

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// No password on the command line or in the environment.
    #[error("No password given. Pass --password or set NUDGE_ADMIN_PASSWORD")]
    MissingPassword,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No account with email: {0}")]
    UnknownUser(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Create a new admin account.
///
/// # Returns
///
/// The id of the created account.
pub async fn create_user(
    email: &str,
    name: Option<String>,
    password: Option<String>,
) -> Result<i32, AdminError> {
    let password = password
        .or_else(|| std::env::var("NUDGE_ADMIN_PASSWORD").ok())
        .ok_or(AdminError::MissingPassword)?;

    let pool = connect().await?;

    tracing::info!("Creating admin account: {}", email);

    let profile = UserProfile {
        name,
        ..UserProfile::default()
    };
    let user = AuthService::new(&pool)
        .register_with_role(email, &password, UserRole::Admin, profile)
        .await?;

    tracing::info!(
        "Admin account created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id.as_i32())
}

/// Promote an existing account to admin.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;

    UserRepository::new(&pool)
        .set_role(&email, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownUser(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!("{} is now an admin", email);
    Ok(())
}
