//! Rate limiter adapters.
//!
//! - `InMemoryRateLimiter` - fixed-window counters for one process

mod config;
mod in_memory;

pub use config::{RateLimitConfig, WindowLimits};
pub use in_memory::InMemoryRateLimiter;
