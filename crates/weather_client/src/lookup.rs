//! Hour-bucketed weather memoization.

use crate::lru::{CacheStats, LruCache};
use crate::WeatherProvider;
use common::{Error, WeatherSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

type WeatherKey = (String, u32);

/// Current-conditions lookup memoized by `(city, hour_bucket)`.
///
/// Only successful responses are cached. The cache lock is never held while a
/// request is in flight.
///
/// The bucket is the hour of day (0..=23) with no date, so an entry fetched at
/// 14h stays a hit at 14h on later days until the LRU evicts it.
pub struct WeatherLookup {
    provider: Arc<dyn WeatherProvider>,
    cache: Mutex<LruCache<WeatherKey, WeatherSnapshot>>,
}

impl WeatherLookup {
    pub fn new(provider: Arc<dyn WeatherProvider>, capacity: usize) -> Self {
        Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<WeatherKey, WeatherSnapshot>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Current conditions for `city`.
    ///
    /// * `Ok(Some(_))`: fresh or cached snapshot.
    /// * `Ok(None)`: the provider is unavailable (transport error, non-200, no key).
    /// * `Err(_)`: the provider answered with something unusable.
    pub async fn fetch(
        &self,
        city: &str,
        hour_bucket: u32,
    ) -> Result<Option<WeatherSnapshot>, Error> {
        let key = (city.to_string(), hour_bucket);
        if let Some(snapshot) = self.cache().get(&key) {
            debug!("Weather cache hit for {} @ {}h", city, hour_bucket);
            return Ok(Some(snapshot));
        }

        match self.provider.current(city).await {
            Ok(snapshot) => {
                self.cache().put(key, snapshot.clone());
                Ok(Some(snapshot))
            }
            Err(e) if e.is_unavailable() => {
                warn!("Weather API error for {}: {}", city, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the provider about `location` directly, bypassing the cache, and
    /// store the answer under `hour_bucket` on success.
    pub async fn validate(&self, location: &str, hour_bucket: u32) -> Result<WeatherSnapshot, Error> {
        let snapshot = self.provider.current(location).await?;
        self.cache()
            .put((location.to_string(), hour_bucket), snapshot.clone());
        Ok(snapshot)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache().len()
    }
}
