//! Ports - Interfaces for external dependencies.
//!
//! Flows and the assistant depend only on these traits. Adapters provide
//! in-memory, file, Postgres and HTTP implementations.
//!
//! ## Persistence Ports
//!
//! - `PollRepository` - polls, options and votes
//! - `ChatHistoryRepository` - append-only chat log
//! - `ContextSnapshotStore` - durable conversation context
//! - `RoleProvider` - admin/user role lookup
//!
//! ## Generation Ports
//!
//! - `GenerativeBackend` - text generation
//! - `RateLimiter` - quota checks before a backend call

mod chat_history;
mod context_snapshot;
mod generative_backend;
mod poll_repository;
mod rate_limiter;
mod role_provider;

pub use chat_history::ChatHistoryRepository;
pub use context_snapshot::{ContextSnapshotStore, SnapshotError};
pub use generative_backend::{BackendError, BackendInfo, GenerativeBackend, Prompt, PromptPurpose};
pub use poll_repository::{PollRepository, RepositoryError};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};
pub use role_provider::RoleProvider;
