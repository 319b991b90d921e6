//! Rate limiting port for the generative backend quota.
//!
//! The request queue consults a limiter before admitting a call so a
//! depleted quota fails fast with a retry hint instead of hitting the
//! provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, UserId};

/// Port for rate limiting operations.
///
/// Implementations use a fixed-window counter and must be safe for
/// concurrent access.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if a request is allowed, consuming a unit of quota if so.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError>;

    /// Current status without consuming quota.
    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError>;

    /// Returns one unit consumed by `check` in the current window.
    async fn release(&self, key: RateLimitKey) -> Result<(), RateLimitError>;

    /// Clears the current window, restoring full quota.
    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError>;
}

/// Key identifying what to rate limit.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub scope: RateLimitScope,
    /// Identifier within the scope (backend name, user id).
    pub identifier: String,
}

/// The scope at which rate limiting is applied.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// Shared quota of one generative backend.
    Backend,
    /// Per-user quota.
    User,
}

impl RateLimitKey {
    pub fn backend(name: &str) -> Self {
        Self {
            scope: RateLimitScope::Backend,
            identifier: name.to_string(),
        }
    }

    pub fn user(user_id: &UserId) -> Self {
        Self {
            scope: RateLimitScope::User,
            identifier: user_id.to_string(),
        }
    }
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Backend => "backend",
            RateLimitScope::User => "user",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.identifier)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    Allowed(RateLimitStatus),
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Timestamp,
    pub window_secs: u64,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    pub limit: u32,
    /// Seconds until the window resets. Never zero.
    pub retry_after_secs: u64,
    pub scope: RateLimitScope,
    pub message: String,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_key_has_backend_scope() {
        let key = RateLimitKey::backend("anthropic");
        assert_eq!(key.scope, RateLimitScope::Backend);
        assert_eq!(key.to_string(), "backend:anthropic");
    }

    #[test]
    fn user_key_uses_user_id() {
        let user_id = UserId::new("user-123").unwrap();
        let key = RateLimitKey::user(&user_id);
        assert_eq!(key.scope, RateLimitScope::User);
        assert_eq!(key.identifier, "user-123");
    }

    #[test]
    fn denied_result_is_not_allowed() {
        let result = RateLimitResult::Denied(RateLimitDenied {
            limit: 10,
            retry_after_secs: 30,
            scope: RateLimitScope::Backend,
            message: "quota exhausted".to_string(),
        });
        assert!(result.is_denied());
        assert!(!result.is_allowed());
    }
}
