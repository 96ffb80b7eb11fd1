//! Backend configuration types.

use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};

/// Top-level backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// WeatherAPI.com key. Empty means "not configured"; the server still starts.
    #[serde(default)]
    pub weather_api_key: String,

    /// Weather provider settings.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Geolocation provider settings.
    #[serde(default)]
    pub geolocation: GeolocationConfig,

    /// Per-client session settings.
    #[serde(default)]
    pub sessions: SessionConfig,
}

/// Weather provider and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Current-conditions endpoint.
    #[serde(default = "default_weather_url")]
    pub api_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max `(city, hour)` entries kept in the weather cache.
    #[serde(default = "default_weather_cache_capacity")]
    pub cache_capacity: usize,
}

/// Geolocation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    /// Providers in initial rotation order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderKind>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum gap between any two geolocation requests, process-wide.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// How long a resolved city stays valid.
    #[serde(default = "default_location_ttl")]
    pub cache_ttl_secs: u64,
}

/// Session retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Drop sessions idle longer than this. 0 keeps them for the process lifetime.
    #[serde(default)]
    pub idle_ttl_secs: u64,

    /// How often the maintenance task runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_bind() -> String {
    "0.0.0.0:5000".into()
}
fn default_weather_url() -> String {
    "http://api.weatherapi.com/v1/current.json".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_weather_cache_capacity() -> usize {
    20
}
fn default_providers() -> Vec<ProviderKind> {
    vec![
        ProviderKind::IpApi,
        ProviderKind::Ipinfo,
        ProviderKind::IpapiCo,
    ]
}
fn default_min_interval_ms() -> u64 {
    1_000
}
fn default_location_ttl() -> u64 {
    1_800
}
fn default_sweep_interval() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            weather_api_key: String::new(),
            weather: WeatherConfig::default(),
            geolocation: GeolocationConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: default_weather_url(),
            timeout_secs: default_timeout_secs(),
            cache_capacity: default_weather_cache_capacity(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            timeout_secs: default_timeout_secs(),
            min_interval_ms: default_min_interval_ms(),
            cache_ttl_secs: default_location_ttl(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 0,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl AppConfig {
    pub fn weather_api_configured(&self) -> bool {
        !self.weather_api_key.trim().is_empty()
    }
}
