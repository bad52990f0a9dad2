//! Authentication route handlers.
//!
//! Password accounts with a signed `authToken` cookie. Login answers with the
//! page the browser should open next instead of redirecting itself, so the
//! same endpoint serves the login modal and the standalone page.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ApiJson, Result, add_breadcrumb, clear_sentry_user};
use crate::middleware::{RequireUser, auth_cookie, clear_auth_cookie};
use crate::models::{User, UserProfile};
use crate::services::AuthService;
use crate::state::AppState;

const DEFAULT_LANDING: &str = "/dashboard";
const ADMIN_LANDING: &str = "/admin";

// =============================================================================
// Request / Response Types
// =============================================================================

/// Registration request. Profile fields are optional.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Page the visitor was sent away from, e.g. `/checkout`.
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub redirect: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a customer account.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .register(&body.email, &body.password, body.profile.normalized())
        .await?;

    tracing::info!(user_id = %user.id, "Account registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Verify credentials and set the `authToken` cookie.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;
    let token = state.token_keys().issue(&user)?;

    let user_id = user.id.to_string();
    let crumb = [("user_id", user_id.as_str())];
    add_breadcrumb("auth", "User logged in", Some(crumb.as_slice()));

    let redirect = landing_page(&user, body.redirect.as_deref());
    let cookie = auth_cookie(token, state.config().secure_cookies());

    Ok((
        [(SET_COOKIE, cookie.to_string())],
        Json(LoginResponse {
            success: true,
            redirect,
            user,
        }),
    ))
}

/// Drop the `authToken` cookie.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    clear_sentry_user();
    let cookie = clear_auth_cookie(state.config().secure_cookies());
    ([(SET_COOKIE, cookie.to_string())], Json(SuccessResponse { success: true }))
}

/// Profile of the logged-in user.
pub async fn me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(user))
}

// =============================================================================
// Helpers
// =============================================================================

/// Where to send the browser after login.
///
/// Admins always land on `/admin`. Everyone else goes back to the page they
/// came from when it is a local path, else to `/dashboard`.
fn landing_page(user: &User, requested: Option<&str>) -> String {
    if user.role.is_admin() {
        return ADMIN_LANDING.to_owned();
    }
    requested
        .filter(|path| is_local_path(path))
        .unwrap_or(DEFAULT_LANDING)
        .to_owned()
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use nudge_core::{Email, UserId, UserRole};

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(1),
            email: Email::parse("ana@example.com").unwrap(),
            role,
            profile: UserProfile::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_always_lands_on_admin() {
        assert_eq!(landing_page(&user(UserRole::Admin), Some("/checkout")), "/admin");
    }

    #[test]
    fn test_customer_returns_to_requested_page() {
        let customer = user(UserRole::Customer);
        assert_eq!(landing_page(&customer, Some("/checkout")), "/checkout");
        assert_eq!(landing_page(&customer, None), "/dashboard");
    }

    #[test]
    fn test_offsite_redirects_ignored() {
        let customer = user(UserRole::Customer);
        assert_eq!(landing_page(&customer, Some("https://evil.test")), "/dashboard");
        assert_eq!(landing_page(&customer, Some("//evil.test")), "/dashboard");
        assert_eq!(landing_page(&customer, Some("/\\evil.test")), "/dashboard");
    }

    #[test]
    fn test_register_request_flattens_profile() {
        let body: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@b.co","password":"longenough","city":"Cali","whatsappNumber":"300"}"#,
        )
        .unwrap();
        assert_eq!(body.profile.city.as_deref(), Some("Cali"));
        assert_eq!(body.profile.whatsapp_number.as_deref(), Some("300"));
        assert_eq!(body.profile.name, None);
    }
}
