//! PostgreSQL adapters - Database implementations for the persistence ports.
//!
//! Queries are checked at runtime (`sqlx::query`), so building the crate
//! needs no live database. The schema lives in `migrations/`.

mod chat_history;
mod context_snapshot;
mod poll_repository;
mod role_provider;

pub use chat_history::PostgresChatHistory;
pub use context_snapshot::PostgresSnapshotStore;
pub use poll_repository::PostgresPollRepository;
pub use role_provider::PostgresRoleProvider;
