//! Geolocation providers.
//!
//! Each service has its own URL scheme and response shape; all of them are
//! reduced to an optional city string.

use async_trait::async_trait;
use common::{Error, LookupTarget, ProviderKind};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; iris-backend/0.1)";

/// A service that maps an address to a city.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Look up the city for `target`.
    ///
    /// `Ok(None)` means the service answered but had no city for the address.
    async fn lookup(&self, target: &LookupTarget) -> Result<Option<String>, Error>;
}

// ── Response shapes ───────────────────────────────────────────────────

/// ip-api.com: `{"status": "success"|"fail", "city": ..., "message": ...}`.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// ipinfo.io: `{"ip": ..., "city": ..., "bogon": true}` for private ranges.
#[derive(Debug, Deserialize)]
struct IpinfoResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    bogon: Option<bool>,
}

/// ipapi.co: `{"city": ...}` or `{"error": true, "reason": ...}`.
#[derive(Debug, Deserialize)]
struct IpapiCoResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    error: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
}

/// Request URL for `kind` locating `target`.
pub fn lookup_url(kind: ProviderKind, target: &LookupTarget) -> String {
    match (kind, target.ip()) {
        (ProviderKind::IpApi, None) => "http://ip-api.com/json/".to_string(),
        (ProviderKind::IpApi, Some(ip)) => format!("http://ip-api.com/json/{ip}"),
        (ProviderKind::Ipinfo, None) => "https://ipinfo.io/json".to_string(),
        (ProviderKind::Ipinfo, Some(ip)) => format!("https://ipinfo.io/{ip}/json"),
        (ProviderKind::IpapiCo, None) => "https://ipapi.co/json/".to_string(),
        (ProviderKind::IpapiCo, Some(ip)) => format!("https://ipapi.co/{ip}/json/"),
    }
}

/// Pull the city out of a provider response body.
pub fn extract_city(kind: ProviderKind, body: &str) -> Result<Option<String>, Error> {
    let city = match kind {
        ProviderKind::IpApi => {
            let parsed: IpApiResponse = serde_json::from_str(body)?;
            if parsed.status.as_deref() == Some("fail") {
                debug!(
                    "ip-api.com lookup failed: {}",
                    parsed.message.as_deref().unwrap_or("no message")
                );
                None
            } else {
                parsed.city
            }
        }
        ProviderKind::Ipinfo => {
            let parsed: IpinfoResponse = serde_json::from_str(body)?;
            if parsed.bogon.unwrap_or(false) {
                debug!("ipinfo.io reported a bogon address");
                None
            } else {
                parsed.city
            }
        }
        ProviderKind::IpapiCo => {
            let parsed: IpapiCoResponse = serde_json::from_str(body)?;
            if parsed.error.unwrap_or(false) {
                debug!(
                    "ipapi.co lookup failed: {}",
                    parsed.reason.as_deref().unwrap_or("no reason")
                );
                None
            } else {
                parsed.city
            }
        }
    };
    Ok(city)
}

// ── HTTP provider ─────────────────────────────────────────────────────

/// One of the public geolocation services, reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGeoProvider {
    kind: ProviderKind,
    client: reqwest::Client,
}

impl HttpGeoProvider {
    pub fn new(kind: ProviderKind, client: reqwest::Client) -> Self {
        Self { kind, client }
    }
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn lookup(&self, target: &LookupTarget) -> Result<Option<String>, Error> {
        let url = lookup_url(self.kind, target);
        debug!("Trying geolocation API: {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", self.kind, e)))?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(Error::RateLimited {
                provider: self.kind.to_string(),
            });
        }
        if status != 200 {
            return Err(Error::GeolocationApi {
                provider: self.kind.to_string(),
                status,
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", self.kind, e)))?;

        extract_city(self.kind, &body)
    }
}

/// Build HTTP providers for `kinds`, in order, sharing one connection pool.
pub fn build_providers(
    kinds: &[ProviderKind],
    timeout: Duration,
) -> Result<Vec<Arc<dyn GeoProvider>>, Error> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(2)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Http(format!("failed to build geolocation HTTP client: {e}")))?;

    Ok(kinds
        .iter()
        .map(|kind| Arc::new(HttpGeoProvider::new(*kind, client.clone())) as Arc<dyn GeoProvider>)
        .collect())
}
