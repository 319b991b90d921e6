//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - in-memory persistence for tests and local runs
//! - `storage` - JSON file context snapshots
//! - `postgres` - PostgreSQL persistence
//! - `ai` - generative backends (Anthropic, OpenAI-compatible, mock)
//! - `rate_limiter` - fixed-window quota

pub mod ai;
pub mod memory;
pub mod postgres;
pub mod rate_limiter;
pub mod storage;
