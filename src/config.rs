//! Configuration loader: merges the .env file, config.toml, and environment overrides.

use common::{AppConfig, Error};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.bind.parse::<SocketAddr>().is_err() {
        issues.push(format!("bind must be a socket address, got {:?}", config.bind));
    }

    if config.weather.api_url.trim().is_empty() {
        issues.push("weather.api_url must not be empty".into());
    }
    if config.weather.timeout_secs == 0 {
        issues.push("weather.timeout_secs must be > 0".into());
    }
    if config.weather.cache_capacity == 0 {
        issues.push("weather.cache_capacity must be > 0".into());
    }

    if config.geolocation.providers.is_empty() {
        issues.push("geolocation.providers must contain at least one provider".into());
    }
    let mut seen = HashSet::new();
    for provider in &config.geolocation.providers {
        if !seen.insert(*provider) {
            issues.push(format!("geolocation.providers lists {provider} more than once"));
        }
    }
    if config.geolocation.timeout_secs == 0 {
        issues.push("geolocation.timeout_secs must be > 0".into());
    }
    if config.geolocation.cache_ttl_secs == 0 {
        issues.push("geolocation.cache_ttl_secs must be > 0".into());
    }

    if config.sessions.sweep_interval_secs == 0 {
        issues.push("sessions.sweep_interval_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides. `var` looks up one variable.
fn apply_env_overrides(
    config: &mut AppConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(key) = var("WEATHER_API_KEY") {
        config.weather_api_key = key.trim().to_string();
    }
    if let Some(url) = var("WEATHER_API_URL") {
        config.weather.api_url = url.trim().to_string();
    }
    if let Some(bind) = var("IRIS_BIND") {
        config.bind = bind.trim().to_string();
    }
    if let Some(raw) = var("IRIS_SESSION_IDLE_TTL_SECS") {
        config.sessions.idle_ttl_secs = parse_u64(&raw, "IRIS_SESSION_IDLE_TTL_SECS")?;
    }
    if let Some(raw) = var("IRIS_GEO_MIN_INTERVAL_MS") {
        config.geolocation.min_interval_ms = parse_u64(&raw, "IRIS_GEO_MIN_INTERVAL_MS")?;
    }
    if let Some(raw) = var("IRIS_GEO_CACHE_TTL_SECS") {
        config.geolocation.cache_ttl_secs = parse_u64(&raw, "IRIS_GEO_CACHE_TTL_SECS")?;
    }
    Ok(())
}

/// Load backend configuration from environment and optional config file.
///
/// Precedence, lowest first: defaults, `config_path`, environment, `bind_override`.
pub fn load_config(config_path: &Path, bind_override: Option<&str>) -> Result<AppConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, replaced wholesale by the config file if present.
    let mut config = AppConfig::default();
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 3. Environment variables.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    // 4. Command line.
    if let Some(bind) = bind_override {
        config.bind = bind.trim().to_string();
    }

    validate_config(&config)?;

    Ok(config)
}
