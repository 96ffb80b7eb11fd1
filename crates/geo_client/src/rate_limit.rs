//! Rate limiter for geolocation lookups.
//!
//! Free tiers allow roughly one request per second; one shared bucket keeps
//! every outbound lookup at least `min_interval` apart across all requests.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Single-slot pacer shared by every geolocation provider.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Option<Arc<DirectLimiter>>,
}

impl RateLimiter {
    /// Space requests at least `min_interval` apart. A zero interval disables pacing.
    pub fn with_min_interval(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| Arc::new(GovLimiter::direct(quota.allow_burst(NonZeroU32::MIN))));
        Self { limiter }
    }

    /// No pacing at all.
    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    /// Wait until the next request slot opens. Concurrent callers queue up
    /// behind each other at the configured cadence.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_second_slot_not_immediately_available() {
        let limiter = RateLimiter::with_min_interval(Duration::from_secs(60));
        limiter.wait().await;
        assert!(timeout(Duration::from_millis(50), limiter.wait())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_zero_interval_is_unlimited() {
        let limiter = RateLimiter::with_min_interval(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_wait_spaces_requests() {
        let limiter = RateLimiter::with_min_interval(Duration::from_millis(100));
        let started = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_clones_share_one_schedule_across_tasks() {
        let limiter = RateLimiter::with_min_interval(Duration::from_millis(100));
        let started = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.wait().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(290));
    }
}
