//! Request queue and quota settings

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    /// Backend calls admitted per window
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests waiting for the worker before `QueueFull`
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Deadline for a single backend call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Extra attempts after backend throttling
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
}

impl QueueConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.requests_per_window == 0 {
            return Err(ValidationError::MustBePositive("queue.requests_per_window"));
        }
        if self.window_secs == 0 {
            return Err(ValidationError::MustBePositive("queue.window_secs"));
        }
        if self.max_pending == 0 {
            return Err(ValidationError::MustBePositive("queue.max_pending"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("queue.request_timeout_secs"));
        }
        if self.retry_ceiling > 5 {
            return Err(ValidationError::TooLarge {
                field: "queue.retry_ceiling",
                max: 5,
            });
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            max_pending: default_max_pending(),
            request_timeout_secs: default_request_timeout(),
            retry_ceiling: default_retry_ceiling(),
        }
    }
}

fn default_requests_per_window() -> u32 {
    15
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_pending() -> usize {
    64
}

fn default_request_timeout() -> u64 {
    20
}

fn default_retry_ceiling() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.requests_per_window, 15);
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = QueueConfig {
            window_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MustBePositive("queue.window_secs"))
        );
    }

    #[test]
    fn retry_ceiling_is_bounded() {
        let config = QueueConfig {
            retry_ceiling: 9,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
