//! Click-event capture
//!
//! Turns one successful redirect into one persisted click event: visitor
//! fingerprint and user-agent classification first (both local), then the
//! best-effort geolocation lookup (the only network-bound step), then a
//! single transactional write that also bumps the link's denormalized
//! counters.
//!
//! Recording is isolated at the redirect boundary: the handler spawns it
//! fire-and-forget and logs failures, so a broken analytics pipeline can
//! never break a redirect.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderMap;
use chrono::Utc;
use url::Url;

use crate::analytics::fingerprint::visitor_hash;
use crate::analytics::geo::CountryResolver;
use crate::analytics::user_agent;
use crate::models::{Link, NewClickEvent};
use crate::storage::Storage;

/// Raw request attributes the capture pipeline consumes, extracted at the
/// HTTP boundary so the recorder itself stays framework-free.
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl ClickContext {
    /// Extract the capture-relevant attributes from a request.
    ///
    /// "referer" wins over the alternate "referrer" spelling when both are
    /// present; header name matching is case-insensitive.
    pub fn from_request(headers: &HeaderMap, client_ip: Option<IpAddr>) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            client_ip: client_ip.map(|ip| ip.to_string()),
            user_agent: header("user-agent"),
            referrer: header("referer").or_else(|| header("referrer")),
        }
    }
}

/// Host portion of a raw referrer header value, or `None` when it does not
/// parse as an absolute URL.
pub fn referrer_host(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()?
        .host_str()
        .map(|host| host.to_string())
}

pub struct ClickRecorder {
    storage: Arc<dyn Storage>,
    geo: Arc<dyn CountryResolver>,
}

impl ClickRecorder {
    pub fn new(storage: Arc<dyn Storage>, geo: Arc<dyn CountryResolver>) -> Self {
        Self { storage, geo }
    }

    /// Persist one click event for `link` and bump its counters.
    ///
    /// The fingerprint, classification, and geolocation steps each degrade
    /// to absent fields on their own; only the final persistence step can
    /// return an error, which the redirect boundary discards.
    pub async fn record(&self, link: &Link, ctx: &ClickContext) -> Result<()> {
        let ip = ctx.client_ip.as_deref();
        let ua = ctx.user_agent.as_deref();

        let visitor = visitor_hash(ip, ua);
        let agent = user_agent::classify(ua);
        let country = self.geo.resolve_country(ip).await;

        let event = NewClickEvent {
            link_id: link.id,
            clicked_at: Utc::now().timestamp(),
            referrer_host: ctx.referrer.as_deref().and_then(referrer_host),
            visitor_hash: visitor,
            country,
            device_category: agent.device_category.map(|c| c.as_str().to_string()),
            browser_name: agent.browser_name,
            browser_version: agent.browser_version,
            os_name: agent.os_name,
            os_version: agent.os_version,
            engine: agent.engine,
        };

        self.storage.record_click(&event).await
    }
}
