//! Domain types shared across the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

// ── Weather ───────────────────────────────────────────────────────────

/// Current conditions for a location, as reported by the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_celsius: f64,
    pub condition_text: String,
    /// Location name as the provider resolved it (may differ from the query).
    pub resolved_location_name: String,
}

// ── Geolocation ───────────────────────────────────────────────────────

/// Supported IP geolocation services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// ip-api.com, 45 requests/minute on the free tier.
    IpApi,
    /// ipinfo.io, 1000 requests/month without a token.
    Ipinfo,
    /// ipapi.co, 1000 requests/month on the free tier.
    IpapiCo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::IpApi => "ip-api.com",
            ProviderKind::Ipinfo => "ipinfo.io",
            ProviderKind::IpapiCo => "ipapi.co",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a geolocation provider should locate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupTarget {
    /// Let the provider locate whoever is calling it (used for local clients,
    /// whose own address says nothing about where they are).
    Auto,
    /// A specific public address.
    Ip(String),
}

impl LookupTarget {
    /// Normalize a client identifier. Loopback and empty identifiers become `Auto`.
    pub fn from_client_id(client_id: &str) -> Self {
        let trimmed = client_id.trim();
        let unbracketed = trimmed.trim_start_matches('[').trim_end_matches(']');

        if unbracketed.is_empty() || unbracketed.eq_ignore_ascii_case("localhost") {
            return LookupTarget::Auto;
        }

        match unbracketed.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) if v4.is_loopback() => LookupTarget::Auto,
            Ok(IpAddr::V6(v6))
                if v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()) =>
            {
                LookupTarget::Auto
            }
            Ok(addr) => LookupTarget::Ip(addr.to_string()),
            Err(_) => LookupTarget::Ip(unbracketed.to_string()),
        }
    }

    /// Key under which a resolved location is cached.
    pub fn cache_key(&self) -> &str {
        match self {
            LookupTarget::Auto => "auto",
            LookupTarget::Ip(ip) => ip,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        match self {
            LookupTarget::Auto => None,
            LookupTarget::Ip(ip) => Some(ip),
        }
    }
}
