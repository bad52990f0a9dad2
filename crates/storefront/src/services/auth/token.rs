//! Signed `authToken` cookie contents.
//!
//! Tokens are HS256 JWTs carrying the user id, email and role. They are valid
//! for [`TOKEN_TTL_DAYS`] and are never refreshed; logging in again issues a
//! new one.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use nudge_core::{UserId, UserRole};

use super::AuthError;
use crate::models::User;

/// Lifetime of an issued token.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Name of the cookie carrying the token.
pub const AUTH_COOKIE: &str = "authToken";

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a decimal string.
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Parse the subject back into a user id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if `sub` is not an integer.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| AuthError::InvalidToken)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Signing and verification keys derived from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a token for `user`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenIssue` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token as if it were `now`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenIssue` if signing fails.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))
    }

    /// Verify signature and expiry and return the claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for an expired token and
    /// `AuthError::InvalidToken` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use nudge_core::Email;

    fn keys(secret: &str) -> TokenKeys {
        TokenKeys::new(&SecretString::from(secret.to_string()))
    }

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(42),
            email: Email::parse("ana@example.com").unwrap(),
            role,
            profile: UserProfile::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys("k3Y!x9#Lm2@pQ7$wR4^tZ8&bN5*cV1(d");
        let token = keys.issue(&user(UserRole::Admin)).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.email, "ana@example.com");
        assert!(claims.is_admin());
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = keys("k3Y!x9#Lm2@pQ7$wR4^tZ8&bN5*cV1(d")
            .issue(&user(UserRole::Customer))
            .unwrap();
        let result = keys("another-signing-key-9f8e7d6c5b4a3").verify(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys("k3Y!x9#Lm2@pQ7$wR4^tZ8&bN5*cV1(d");
        let issued = Utc::now() - Duration::days(TOKEN_TTL_DAYS + 1);
        let token = keys.issue_at(&user(UserRole::Customer), issued).unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = keys("k3Y!x9#Lm2@pQ7$wR4^tZ8&bN5*cV1(d");
        assert!(matches!(keys.verify("not.a.jwt"), Err(AuthError::InvalidToken)));
    }
}
