//! Authentication extractors.
//!
//! Identity travels in the `authToken` cookie as a signed JWT. The extractors
//! verify it on every request; there is no server-side session for auth.
//!
//! Rejections depend on the path: `/api/...` requests get `401`/`403`, page
//! requests are redirected to `/login?redirect=<path>` (or `/` when a
//! non-admin opens an admin page).

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{HeaderMap, StatusCode, header::COOKIE, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration as CookieDuration};

use nudge_core::{UserId, UserRole};

use crate::error::set_sentry_user;
use crate::services::auth::{AUTH_COOKIE, AuthError, Claims, TOKEN_TTL_DAYS};
use crate::state::AppState;

/// The authenticated caller, as stated by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl TryFrom<Claims> for CurrentUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims.user_id()?,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Extractor that requires a valid token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

/// Extractor that requires a valid token with the admin role.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that reads the token when present and valid.
pub struct OptionalUser(pub Option<CurrentUser>);

/// Error returned when authentication is required but missing or insufficient.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to the login page, then back to the given path.
    RedirectToLogin(String),
    /// Logged in, but not allowed on this page.
    RedirectHome,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Forbidden response (for API requests).
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(path) => Redirect::to(&login_redirect(&path)).into_response(),
            Self::RedirectHome => Redirect::to("/").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, state)
            .map(Self)
            .ok_or_else(|| missing_auth(parts))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(&parts.headers, state).ok_or_else(|| missing_auth(parts))?;
        if !user.is_admin() {
            return Err(if is_api(parts) {
                AuthRejection::Forbidden
            } else {
                AuthRejection::RedirectHome
            });
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(&parts.headers, state)))
    }
}

/// Full request path; nested routers only see the part after their prefix.
fn request_path(parts: &Parts) -> &str {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path(), |original| original.0.path())
}

fn is_api(parts: &Parts) -> bool {
    request_path(parts).starts_with("/api/")
}

fn missing_auth(parts: &Parts) -> AuthRejection {
    if is_api(parts) {
        AuthRejection::Unauthorized
    } else {
        AuthRejection::RedirectToLogin(request_path(parts).to_owned())
    }
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Option<CurrentUser> {
    let token = token_from_headers(headers)?;
    let claims = match state.token_keys().verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected auth token");
            return None;
        }
    };
    let user = CurrentUser::try_from(claims).ok()?;
    set_sentry_user(&user.id, Some(&user.email));
    Some(user)
}

/// Read the `authToken` cookie value.
#[must_use]
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == AUTH_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}

/// `/login?redirect=<path>` with the path percent-encoded.
#[must_use]
pub fn login_redirect(path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    format!("/login?redirect={encoded}")
}

/// The cookie set after login.
#[must_use]
pub fn auth_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::days(TOKEN_TTL_DAYS))
        .build()
}

/// An expired `authToken` cookie, which makes the browser drop it.
#[must_use]
pub fn clear_auth_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(CookieDuration::ZERO)
        .build()
}
