//! In-memory rate limiter.
//!
//! Fixed-window counters in a map keyed by [`RateLimitKey`]. Windows are
//! measured with the tokio clock so tests can pause and advance time.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// In-memory fixed-window rate limiter for a single process.
#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Arc<RwLock<HashMap<RateLimitKey, WindowState>>>,
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

impl WindowState {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) >= window
    }

    fn remaining_window(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    fn limits_for(&self, key: &RateLimitKey) -> (u32, Duration) {
        let limits = self.config.limits_for(key.scope);
        (limits.requests_per_window, Duration::from_secs(limits.window_secs))
    }
}

/// Whole seconds until the window ends, rounded up and never zero.
fn retry_after(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let (limit, window) = self.limits_for(&key);
        let now = Instant::now();

        let mut windows = self.windows.write().await;
        let state = windows
            .entry(key.clone())
            .or_insert_with(|| WindowState::fresh(now));

        if state.expired(now, window) {
            *state = WindowState::fresh(now);
        }

        let remaining_window = state.remaining_window(now, window);
        if state.count >= limit {
            let retry_after_secs = retry_after(remaining_window);
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs,
                scope: key.scope,
                message: format!(
                    "Rate limit exceeded for {}. Retry after {} seconds.",
                    key, retry_after_secs
                ),
            }));
        }

        state.count += 1;
        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(state.count),
            reset_at: Timestamp::now().plus_secs(retry_after(remaining_window)),
            window_secs: window.as_secs(),
        }))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let (limit, window) = self.limits_for(&key);
        let now = Instant::now();

        let windows = self.windows.read().await;
        let (count, remaining_window) = windows
            .get(&key)
            .filter(|state| !state.expired(now, window))
            .map(|state| (state.count, state.remaining_window(now, window)))
            .unwrap_or((0, window));

        Ok(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: Timestamp::now().plus_secs(retry_after(remaining_window)),
            window_secs: window.as_secs(),
        })
    }

    async fn release(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        let (_, window) = self.limits_for(&key);
        let now = Instant::now();
        if let Some(state) = self.windows.write().await.get_mut(&key) {
            if !state.expired(now, window) {
                state.count = state.count.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RateLimitScope;

    fn limiter(limit: u32, window_secs: u64) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(RateLimitConfig::backend_only(limit, window_secs))
    }

    #[tokio::test]
    async fn denies_requests_at_limit() {
        let limiter = limiter(3, 60);
        let key = RateLimitKey::backend("mock");

        for _ in 0..3 {
            assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
        }

        match limiter.check(key.clone()).await.unwrap() {
            RateLimitResult::Denied(denied) => {
                assert_eq!(denied.limit, 3);
                assert!(denied.retry_after_secs > 0 && denied.retry_after_secs <= 60);
                assert_eq!(denied.scope, RateLimitScope::Backend);
            }
            RateLimitResult::Allowed(_) => panic!("fourth request should be denied"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_restores_quota() {
        let limiter = limiter(2, 60);
        let key = RateLimitKey::backend("mock");

        limiter.check(key.clone()).await.unwrap();
        limiter.check(key.clone()).await.unwrap();
        assert!(limiter.check(key.clone()).await.unwrap().is_denied());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(limiter.check(key.clone()).await.unwrap().is_denied());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down() {
        let limiter = limiter(1, 60);
        let key = RateLimitKey::backend("mock");
        limiter.check(key.clone()).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        match limiter.check(key).await.unwrap() {
            RateLimitResult::Denied(denied) => assert_eq!(denied.retry_after_secs, 15),
            RateLimitResult::Allowed(_) => panic!("should be denied"),
        }
    }

    #[tokio::test]
    async fn status_does_not_consume() {
        let limiter = limiter(5, 60);
        let key = RateLimitKey::backend("mock");

        assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 5);
        limiter.check(key.clone()).await.unwrap();
        limiter.check(key.clone()).await.unwrap();
        assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 3);
        assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 3);
    }

    #[tokio::test]
    async fn release_returns_one_unit() {
        let limiter = limiter(1, 60);
        let key = RateLimitKey::backend("mock");
        limiter.check(key.clone()).await.unwrap();
        limiter.release(key.clone()).await.unwrap();
        assert!(limiter.check(key.clone()).await.unwrap().is_allowed());

        // Nothing to give back for an unknown key.
        limiter.release(RateLimitKey::backend("other")).await.unwrap();
        assert_eq!(limiter.status(key).await.unwrap().remaining, 0);
    }

    #[tokio::test]
    async fn reset_clears_counter() {
        let limiter = limiter(1, 60);
        let key = RateLimitKey::backend("mock");
        limiter.check(key.clone()).await.unwrap();
        assert!(limiter.check(key.clone()).await.unwrap().is_denied());

        limiter.reset(key.clone()).await.unwrap();
        assert!(limiter.check(key).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = limiter(1, 60);
        let a = RateLimitKey::backend("a");
        let b = RateLimitKey::backend("b");

        limiter.check(a.clone()).await.unwrap();
        assert!(limiter.check(a).await.unwrap().is_denied());
        assert!(limiter.check(b).await.unwrap().is_allowed());
    }
}
