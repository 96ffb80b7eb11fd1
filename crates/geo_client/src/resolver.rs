//! Client-to-city resolution across rotating providers.

use crate::cache::LocationCache;
use crate::providers::{build_providers, GeoProvider};
use crate::rate_limit::RateLimiter;
use common::config::GeolocationConfig;
use common::{Error, LookupTarget};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// True if a provider's city field names an actual place.
pub fn is_usable_city(city: &str) -> bool {
    let trimmed = city.trim();
    !trimmed.is_empty()
        && !matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "unknown" | "none" | "null"
        )
}

/// Resolves clients to cities.
///
/// * Cached cities are returned without touching the network.
/// * Every outbound request waits on the shared [`RateLimiter`].
/// * Providers are tried starting at the rotation cursor, each at most once
///   per call; the cursor moves one step per attempt whatever the outcome.
pub struct GeoResolver {
    providers: Vec<Arc<dyn GeoProvider>>,
    cache: LocationCache,
    limiter: RateLimiter,
    cursor: Mutex<usize>,
}

impl GeoResolver {
    pub fn new(
        providers: Vec<Arc<dyn GeoProvider>>,
        cache: LocationCache,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            providers,
            cache,
            limiter,
            cursor: Mutex::new(0),
        }
    }

    /// Build the resolver with real HTTP providers.
    pub fn from_config(cfg: &GeolocationConfig) -> Result<Self, Error> {
        let providers = build_providers(&cfg.providers, Duration::from_secs(cfg.timeout_secs))?;
        Ok(Self::new(
            providers,
            LocationCache::new(Duration::from_secs(cfg.cache_ttl_secs)),
            RateLimiter::with_min_interval(Duration::from_millis(cfg.min_interval_ms)),
        ))
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn cache(&self) -> &LocationCache {
        &self.cache
    }

    /// Index of the provider the next call starts with.
    pub fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance_cursor(&self) {
        let count = self.providers.len();
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        *cursor = (*cursor + 1) % count;
    }

    /// Store a city for `client_id` as if a provider had just returned it.
    pub fn remember(&self, client_id: &str, city: &str) {
        let target = LookupTarget::from_client_id(client_id);
        self.cache.insert(target.cache_key(), city.trim());
    }

    /// Resolve `client_id` to a city. `None` means "location unknown".
    pub async fn resolve(&self, client_id: &str) -> Option<String> {
        let target = LookupTarget::from_client_id(client_id);
        let key = target.cache_key().to_string();

        if let Some(city) = self.cache.get_fresh(&key) {
            debug!("Using cached location for {}: {}", key, city);
            return Some(city);
        }

        let count = self.providers.len();
        if count == 0 {
            warn!("No geolocation providers configured");
            return None;
        }

        let start = self.cursor();
        for offset in 0..count {
            let provider = &self.providers[(start + offset) % count];

            self.limiter.wait().await;
            let outcome = provider.lookup(&target).await;
            self.advance_cursor();

            match outcome {
                Ok(Some(city)) if is_usable_city(&city) => {
                    let city = city.trim().to_string();
                    info!("Resolved {} to {} via {}", key, city, provider.name());
                    self.cache.insert(key, city.clone());
                    return Some(city);
                }
                Ok(city) => {
                    warn!("{} returned invalid city: {:?}", provider.name(), city);
                }
                Err(Error::RateLimited { provider }) => {
                    warn!("Rate limited on {}, trying next API", provider);
                }
                Err(e) => {
                    warn!("Error with geolocation API {}: {}", provider.name(), e);
                }
            }
        }

        warn!("All geolocation APIs failed or returned invalid data for {}", key);
        None
    }
}
