//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_JWT_SECRET` - Auth token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CATALOG_PATH` - Product catalog YAML (default: crates/storefront/content/products.yaml)
//! - `STOREFRONT_BEHAVIOR_FLUSH_SECS` - Aggregate flush interval (default: 86400)
//! - `STOREFRONT_BEHAVIOR_LIST_LIMIT` - Max rows from `GET /api/behavior` (default: 1000)
//! - `STOREFRONT_INTENT_RETRAIN_SECS` - Intent model retrain interval (default: 60)
//! - `STOREFRONT_INTENT_MAX_SAMPLES` - Training set cap (default: 5000)
//! - `STOREFRONT_GEO_LOOKUP_URL` - IP geolocation URL with an `{ip}` placeholder
//! - `STOREFRONT_REALTIME_FANOUT` - `local` or `postgres` (default: local)
//! - `STOREFRONT_RATE_LIMIT` - Enable per-IP rate limits (default: true)
//! - `STOREFRONT_LOG_JSON` - Emit JSON logs (default: false)
//! - `PAYPAL_CLIENT_ID` - Hosted payment widget client id
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_CATALOG_PATH: &str = "crates/storefront/content/products.yaml";
const DEFAULT_FLUSH_SECS: u64 = 24 * 60 * 60;
const DEFAULT_RETRAIN_SECS: u64 = 60;
const DEFAULT_MAX_TRAINING_SAMPLES: i64 = 5000;
const DEFAULT_BEHAVIOR_LIST_LIMIT: i64 = 1000;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// How realtime events reach admin streams on other instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanoutMode {
    /// In-process broadcast only.
    #[default]
    Local,
    /// Publish through `PostgreSQL` `NOTIFY` and relay what every instance hears.
    Postgres,
}

impl FromStr for FanoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "postgres" => Ok(Self::Postgres),
            other => Err(format!("expected `local` or `postgres`, got `{other}`")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// HS256 signing secret for the `authToken` cookie
    pub jwt_secret: SecretString,
    /// Product catalog file
    pub catalog_path: PathBuf,
    pub behavior: BehaviorConfig,
    pub intent: IntentConfig,
    pub realtime: RealtimeConfig,
    /// Per-IP rate limiting on auth and ingest routes
    pub rate_limit_enabled: bool,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Client id handed to the hosted payment widget
    pub paypal_client_id: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Behavior ingest settings.
#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    pub flush_interval: Duration,
    pub list_limit: i64,
}

/// Intent model training settings.
#[derive(Debug, Clone)]
pub struct IntentConfig {
    pub retrain_interval: Duration,
    pub max_training_samples: i64,
}

/// Realtime relay settings.
#[derive(Debug, Clone, Default)]
pub struct RealtimeConfig {
    pub fanout: FanoutMode,
    /// Lookup URL containing `{ip}`; geo enrichment is off when unset.
    pub geo_lookup_url: Option<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_SECS),
            list_limit: DEFAULT_BEHAVIOR_LIST_LIMIT,
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            retrain_interval: Duration::from_secs(DEFAULT_RETRAIN_SECS),
            max_training_samples: DEFAULT_MAX_TRAINING_SAMPLES,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the JWT secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1".parse::<IpAddr>().ok())?;
        let port = parse_env_or_default("STOREFRONT_PORT", Some(3000_u16))?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        let jwt_secret = get_validated_secret("STOREFRONT_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "STOREFRONT_JWT_SECRET")?;

        let catalog_path =
            PathBuf::from(get_env_or_default("STOREFRONT_CATALOG_PATH", DEFAULT_CATALOG_PATH));

        let behavior = BehaviorConfig {
            flush_interval: Duration::from_secs(parse_env_or_default(
                "STOREFRONT_BEHAVIOR_FLUSH_SECS",
                Some(DEFAULT_FLUSH_SECS),
            )?),
            list_limit: parse_env_or_default(
                "STOREFRONT_BEHAVIOR_LIST_LIMIT",
                Some(DEFAULT_BEHAVIOR_LIST_LIMIT),
            )?,
        };
        let intent = IntentConfig {
            retrain_interval: Duration::from_secs(parse_env_or_default(
                "STOREFRONT_INTENT_RETRAIN_SECS",
                Some(DEFAULT_RETRAIN_SECS),
            )?),
            max_training_samples: parse_env_or_default(
                "STOREFRONT_INTENT_MAX_SAMPLES",
                Some(DEFAULT_MAX_TRAINING_SAMPLES),
            )?,
        };
        let realtime = RealtimeConfig {
            fanout: parse_env_or_default("STOREFRONT_REALTIME_FANOUT", Some(FanoutMode::Local))?,
            geo_lookup_url: get_optional_env("STOREFRONT_GEO_LOOKUP_URL"),
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            jwt_secret,
            catalog_path,
            behavior,
            intent,
            realtime,
            rate_limit_enabled: parse_env_or_default("STOREFRONT_RATE_LIMIT", Some(true))?,
            log_json: parse_env_or_default("STOREFRONT_LOG_JSON", Some(false))?,
            paypal_client_id: get_optional_env("PAYPAL_CLIENT_ID"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env_or_default<T>(key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string())),
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "T").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "T").is_ok());
    }

    #[test]
    fn test_fanout_mode_parse() {
        assert_eq!("postgres".parse::<FanoutMode>().unwrap(), FanoutMode::Postgres);
        assert_eq!(" Local ".parse::<FanoutMode>().unwrap(), FanoutMode::Local);
        assert!("redis".parse::<FanoutMode>().is_err());
    }

    #[test]
    fn test_socket_addr_and_secure_cookies() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://shop.test".to_string(),
            jwt_secret: SecretString::from("x".repeat(32)),
            catalog_path: PathBuf::from("products.yaml"),
            behavior: BehaviorConfig::default(),
            intent: IntentConfig::default(),
            realtime: RealtimeConfig::default(),
            rate_limit_enabled: false,
            log_json: false,
            paypal_client_id: None,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.port(), 3000);
        assert!(config.secure_cookies());
        assert_eq!(config.behavior.flush_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn test_debug_does_not_leak_secrets() {
        let secret = SecretString::from("kJ8#mQ2$vL9!pX4@".to_string());
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("kJ8#mQ2$vL9!pX4@"));
    }
}
