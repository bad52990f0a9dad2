//! Country lookup for realtime events.
//!
//! Resolves a client IP to an ISO country code through an HTTP lookup service
//! (`{ip}` is substituted into the configured URL, and the JSON response must
//! carry `country_code`) and renders it as a flag emoji. Results are cached
//! for an hour. Any failure yields [`UNKNOWN_FLAG`].

use std::net::IpAddr;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Shown when the country cannot be determined.
pub const UNKNOWN_FLAG: &str = "🌍";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors that can occur when looking up a country.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup service returned {0}")]
    Status(u16),
}

#[derive(Deserialize)]
struct LookupResponse {
    country_code: Option<String>,
}

/// IP-to-flag resolver.
#[derive(Clone)]
pub struct GeoLocator {
    client: reqwest::Client,
    url_template: Option<String>,
    cache: Cache<IpAddr, Option<String>>,
}

impl GeoLocator {
    /// Create a locator. With no `url_template` every lookup is unknown.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(url_template: Option<String>) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Ok(Self {
            client,
            url_template,
            cache,
        })
    }

    /// A locator that never makes requests.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            url_template: None,
            cache: Cache::new(1),
        }
    }

    /// Flag emoji for `ip`, or [`UNKNOWN_FLAG`].
    pub async fn flag_for(&self, ip: Option<IpAddr>) -> String {
        let code = match ip {
            Some(ip) => self.country_code(ip).await,
            None => None,
        };
        code.as_deref()
            .and_then(flag_emoji)
            .unwrap_or_else(|| UNKNOWN_FLAG.to_string())
    }

    /// ISO country code for `ip`. Private and loopback addresses are never
    /// looked up.
    pub async fn country_code(&self, ip: IpAddr) -> Option<String> {
        let template = self.url_template.as_deref()?;
        if !is_public(ip) {
            return None;
        }

        if let Some(cached) = self.cache.get(&ip).await {
            return cached;
        }

        match self.lookup(template, ip).await {
            Ok(code) => {
                self.cache.insert(ip, code.clone()).await;
                code
            }
            Err(e) => {
                debug!(error = %e, %ip, "Geo lookup failed");
                None
            }
        }
    }

    #[instrument(skip(self, template))]
    async fn lookup(&self, template: &str, ip: IpAddr) -> Result<Option<String>, GeoError> {
        let url = template.replace("{ip}", &ip.to_string());
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let body: LookupResponse = response.json().await?;
        Ok(body.country_code)
    }
}

/// Regional-indicator pair for a two-letter country code.
#[must_use]
pub fn flag_emoji(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    code.bytes()
        .map(|b| char::from_u32(0x1F1E6 + u32::from(b.to_ascii_uppercase() - b'A')))
        .collect()
}

fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_emoji() {
        assert_eq!(flag_emoji("CO").as_deref(), Some("🇨🇴"));
        assert_eq!(flag_emoji("us").as_deref(), Some("🇺🇸"));
        assert_eq!(flag_emoji("USA"), None);
        assert_eq!(flag_emoji("1A"), None);
        assert_eq!(flag_emoji(""), None);
    }

    #[test]
    fn test_private_addresses_not_public() {
        assert!(!is_public("10.0.0.1".parse().unwrap()));
        assert!(!is_public("127.0.0.1".parse().unwrap()));
        assert!(!is_public("::1".parse().unwrap()));
        assert!(is_public("8.8.8.8".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_disabled_is_unknown() {
        let geo = GeoLocator::disabled();
        assert_eq!(geo.flag_for(Some("8.8.8.8".parse().unwrap())).await, UNKNOWN_FLAG);
        assert_eq!(geo.flag_for(None).await, UNKNOWN_FLAG);
    }

    #[tokio::test]
    async fn test_private_ip_skips_lookup() {
        let geo = GeoLocator::new(Some("http://127.0.0.1:9/{ip}".to_string())).unwrap();
        assert_eq!(geo.country_code("192.168.1.10".parse().unwrap()).await, None);
    }
}
