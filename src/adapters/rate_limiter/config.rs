//! Rate limit configuration types.

use serde::{Deserialize, Serialize};

use crate::ports::RateLimitScope;

/// Quota per scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Shared generative backend quota.
    pub backend: WindowLimits,
    /// Per-user quota.
    pub per_user: WindowLimits,
}

/// A fixed window: at most `requests_per_window` within `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimits {
    pub requests_per_window: u32,
    pub window_secs: u64,
}

impl WindowLimits {
    pub fn new(requests_per_window: u32, window_secs: u64) -> Self {
        Self {
            requests_per_window,
            window_secs,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: WindowLimits::new(15, 60),
            per_user: WindowLimits::new(30, 60),
        }
    }
}

impl RateLimitConfig {
    /// Only a backend quota, as used by the request queue.
    pub fn backend_only(requests_per_window: u32, window_secs: u64) -> Self {
        Self {
            backend: WindowLimits::new(requests_per_window, window_secs),
            ..Self::default()
        }
    }

    pub fn limits_for(&self, scope: RateLimitScope) -> WindowLimits {
        match scope {
            RateLimitScope::Backend => self.backend,
            RateLimitScope::User => self.per_user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_window_is_one_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.backend.window_secs, 60);
        assert_eq!(config.backend.requests_per_window, 15);
    }

    #[test]
    fn limits_follow_scope() {
        let config = RateLimitConfig::backend_only(3, 10);
        assert_eq!(config.limits_for(RateLimitScope::Backend), WindowLimits::new(3, 10));
        assert_eq!(config.limits_for(RateLimitScope::User), config.per_user);
    }

    #[test]
    fn config_serializes_to_json() {
        let json = serde_json::to_string(&RateLimitConfig::default()).unwrap();
        assert!(json.contains("\"requests_per_window\":15"));
    }
}
