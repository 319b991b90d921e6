//! In-memory adapters for tests and local runs.

mod chat_history;
mod context_snapshot;
mod poll_repository;
mod role_provider;

pub use chat_history::InMemoryChatHistory;
pub use context_snapshot::InMemorySnapshotStore;
pub use poll_repository::InMemoryPollRepository;
pub use role_provider::StaticRoleProvider;
