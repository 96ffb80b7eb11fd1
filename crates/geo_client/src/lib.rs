//! IP geolocation for weather requests.
//!
//! Resolves a client address to a city by rotating across several free
//! geolocation services, pacing requests process-wide and caching results.

pub mod cache;
pub mod providers;
pub mod rate_limit;
pub mod resolver;

pub use cache::{LocationCache, LocationEntry};
pub use providers::{build_providers, GeoProvider, HttpGeoProvider};
pub use rate_limit::RateLimiter;
pub use resolver::{is_usable_city, GeoResolver};
