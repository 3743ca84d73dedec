//! Best-effort IP geolocation
//!
//! Resolves a coarse two-letter country code for a client IP through an
//! external lookup service. The resolver is strictly best-effort: any
//! network failure, timeout, or malformed response yields an absent country,
//! never an error. It is modeled as a trait so the write path can be tested
//! against slow, failing, or malformed stand-ins.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::GeoConfig;

#[async_trait]
pub trait CountryResolver: Send + Sync {
    /// Resolve a two-letter country code for the given IP, or `None`.
    ///
    /// Implementations must never fail outward.
    async fn resolve_country(&self, ip: Option<&str>) -> Option<String>;
}

/// Resolver backed by an ip-api.com-style HTTP endpoint.
///
/// Issues a single bounded-timeout GET per lookup, requesting only the
/// country-code field. Loopback and private-range addresses never hit the
/// network: loopback maps to the configured placeholder country (absent by
/// default), private ranges are always absent.
pub struct HttpCountryResolver {
    client: Client,
    endpoint: String,
    local_country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountryPayload {
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

impl HttpCountryResolver {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build geolocation HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            local_country: config.local_country.clone(),
        })
    }

    async fn lookup(&self, ip: &str) -> Option<String> {
        let url = format!("{}/{}?fields=countryCode", self.endpoint, ip);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(ip = %ip, error = %err, "country lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(ip = %ip, status = %response.status(), "country lookup rejected");
            return None;
        }

        let payload: CountryPayload = response.json().await.ok()?;
        normalize_country_code(payload.country_code.as_deref())
    }
}

#[async_trait]
impl CountryResolver for HttpCountryResolver {
    async fn resolve_country(&self, ip: Option<&str>) -> Option<String> {
        let ip = match ip {
            Some(ip) if !ip.is_empty() => ip,
            _ => return None,
        };

        if is_loopback(ip) {
            return self.local_country.clone();
        }
        if is_private(ip) {
            return None;
        }

        self.lookup(ip).await
    }
}

/// Resolver used when geolocation is disabled by configuration.
pub struct DisabledCountryResolver;

#[async_trait]
impl CountryResolver for DisabledCountryResolver {
    async fn resolve_country(&self, _ip: Option<&str>) -> Option<String> {
        None
    }
}

/// Accept only a well-formed 2-letter code; anything else is a failed lookup.
fn normalize_country_code(code: Option<&str>) -> Option<String> {
    let code = code?.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

fn is_loopback(ip: &str) -> bool {
    if ip == "localhost" {
        return true;
    }
    ip.parse::<IpAddr>().map(|addr| addr.is_loopback()).unwrap_or(false)
}

fn is_private(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => addr.is_private() || addr.is_link_local() || addr.is_unspecified(),
        Ok(IpAddr::V6(addr)) => addr.is_unspecified() || (addr.segments()[0] & 0xfe00) == 0xfc00,
        // Unparsable input can't be looked up meaningfully.
        Err(_) => true,
    }
}
