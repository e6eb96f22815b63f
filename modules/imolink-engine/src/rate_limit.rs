//! Domain-scoped rate limiter: a randomized pause before every request
//! to the same domain. Randomization matters as much as the pause itself
//! for staying under throttling heuristics.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

pub struct DomainRateLimiter {
    min: Duration,
    max: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl DomainRateLimiter {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Sleep until at least a random min..=max pause has elapsed since
    /// the previous request to `domain`, then stamp the domain.
    pub async fn wait(&self, domain: &str) {
        let pause = {
            let mut rng = rand::rng();
            rng.random_range(self.min..=self.max)
        };

        let sleep_for = {
            let last = self.last_request.lock().await;
            match last.get(domain) {
                Some(prev) => pause.saturating_sub(prev.elapsed()),
                None => Duration::ZERO,
            }
        };

        if !sleep_for.is_zero() {
            debug!(domain, ?sleep_for, "Rate limit pause");
            tokio::time::sleep(sleep_for).await;
        }

        self.last_request
            .lock()
            .await
            .insert(domain.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(2), Duration::from_secs(4));
        let started = Instant::now();
        limiter.wait("bing.com").await;
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn second_request_waits_out_the_pause() {
        let limiter =
            DomainRateLimiter::new(Duration::from_millis(50), Duration::from_millis(80));
        limiter.wait("bing.com").await;
        let started = Instant::now();
        limiter.wait("bing.com").await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn domains_are_independent() {
        let limiter =
            DomainRateLimiter::new(Duration::from_millis(200), Duration::from_millis(300));
        limiter.wait("bing.com").await;
        let started = Instant::now();
        limiter.wait("other.com").await;
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
