//! In-memory context snapshot store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::conversation::ContextSnapshot;
use crate::domain::foundation::UserId;
use crate::ports::{ContextSnapshotStore, SnapshotError};

#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<UserId, ContextSnapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl ContextSnapshotStore for InMemorySnapshotStore {
    async fn load_context_snapshot(
        &self,
        user: &UserId,
    ) -> Result<Option<ContextSnapshot>, SnapshotError> {
        Ok(self.snapshots.read().await.get(user).cloned())
    }

    async fn upsert_context_snapshot(&self, snapshot: &ContextSnapshot) -> Result<(), SnapshotError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.user_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete_context_snapshot(&self, user: &UserId) -> Result<(), SnapshotError> {
        self.snapshots.write().await.remove(user);
        Ok(())
    }
}
