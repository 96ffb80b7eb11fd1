//! Unified error type for the IRIS backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Geolocation provider {provider} returned status {status}")]
    GeolocationApi { provider: String, status: u16 },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Weather API error (status={status}): {message}")]
    WeatherApi { status: u16, message: String },
}

impl Error {
    /// True when the failure means "the remote service could not answer right now"
    /// rather than "the answer made no sense".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::GeolocationApi { .. }
                | Error::RateLimited { .. }
                | Error::WeatherApi { .. }
                | Error::Config(_)
        )
    }
}
