//! WeatherAPI.com client.
//!
//! Fetches current conditions for a city and converts them to the shared
//! `WeatherSnapshot` format. [`WeatherLookup`] memoizes results per hour.

pub mod lookup;
pub mod lru;

pub use lookup::WeatherLookup;
pub use lru::{CacheStats, LruCache};

use async_trait::async_trait;
use common::config::WeatherConfig;
use common::{Error, WeatherSnapshot};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Anything that can report current conditions for a free-form location query.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// False when the provider cannot possibly answer (e.g. no API key).
    fn is_configured(&self) -> bool;

    async fn current(&self, location: &str) -> Result<WeatherSnapshot, Error>;
}

/// Response from `current.json`.
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub current: Current,
    pub location: Location,
}

#[derive(Debug, Deserialize)]
pub struct Current {
    pub temp_c: f64,
    pub condition: Condition,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub name: String,
}

/// Error body: `{"error": {"code": 1006, "message": "No matching location found."}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl From<CurrentResponse> for WeatherSnapshot {
    fn from(resp: CurrentResponse) -> Self {
        WeatherSnapshot {
            temperature_celsius: resp.current.temp_c,
            condition_text: resp.current.condition.text,
            resolved_location_name: resp.location.name,
        }
    }
}

/// Parse a successful `current.json` body.
pub fn parse_current(body: &str) -> Result<WeatherSnapshot, Error> {
    let parsed: CurrentResponse = serde_json::from_str(body)?;
    Ok(parsed.into())
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => body.chars().take(500).collect(),
    }
}

/// WeatherAPI.com client.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl WeatherApiClient {
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("iris-backend/0.1")
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build weather HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            api_url,
        })
    }

    pub fn from_config(api_key: &str, cfg: &WeatherConfig) -> Result<Self, Error> {
        Self::new(
            api_key.trim().to_string(),
            cfg.api_url.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn current(&self, location: &str) -> Result<WeatherSnapshot, Error> {
        if !self.is_configured() {
            return Err(Error::Config("WEATHER_API_KEY is not set".into()));
        }

        debug!("Fetching weather for: {}", location);

        let resp = self
            .client
            .get(&self.api_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("aqi", "no"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("weather request for {location}: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("weather body for {location}: {e}")))?;

        if status != 200 {
            return Err(Error::WeatherApi {
                status,
                message: api_error_message(&body),
            });
        }

        parse_current(&body)
    }
}
