//! Context Snapshot Port - durable backing for the context store.
//!
//! Snapshots let a conversation continue across processes: the in-process
//! cache is authoritative while warm and this store fills it on a miss.

use async_trait::async_trait;

use crate::domain::conversation::ContextSnapshot;
use crate::domain::foundation::UserId;

/// Errors that can occur during snapshot storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to serialize snapshot: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize snapshot: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Port for persisting context snapshots
#[async_trait]
pub trait ContextSnapshotStore: Send + Sync {
    /// Load the snapshot for a user, `None` if there is none.
    async fn load_context_snapshot(
        &self,
        user: &UserId,
    ) -> Result<Option<ContextSnapshot>, SnapshotError>;

    /// Insert or replace the snapshot for `snapshot.user_id`.
    async fn upsert_context_snapshot(&self, snapshot: &ContextSnapshot) -> Result<(), SnapshotError>;

    /// Remove the snapshot. Deleting a missing snapshot is not an error.
    async fn delete_context_snapshot(&self, user: &UserId) -> Result<(), SnapshotError>;
}
