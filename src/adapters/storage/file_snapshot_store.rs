//! File-based Context Snapshot Adapter
//!
//! Stores one JSON document per user under a base directory. Writes go to
//! a temporary file first and are renamed into place.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::conversation::ContextSnapshot;
use crate::domain::foundation::UserId;
use crate::ports::{ContextSnapshotStore, SnapshotError};

/// File-based storage for context snapshots
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    base_path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `base_path`. The directory is created on first write.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn snapshot_path(&self, user: &UserId) -> PathBuf {
        self.base_path.join(format!("{}.json", file_stem(user)))
    }

    async fn ensure_dir(&self) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))
    }
}

/// Escapes everything outside `[A-Za-z0-9_-]` so ids map to distinct names.
fn file_stem(user: &UserId) -> String {
    user.as_str()
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => (b as char).to_string(),
            other => format!("%{:02x}", other),
        })
        .collect()
}

#[async_trait]
impl ContextSnapshotStore for FileSnapshotStore {
    async fn load_context_snapshot(
        &self,
        user: &UserId,
    ) -> Result<Option<ContextSnapshot>, SnapshotError> {
        let path = self.snapshot_path(user);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnapshotError::IoError(e.to_string())),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }

    async fn upsert_context_snapshot(&self, snapshot: &ContextSnapshot) -> Result<(), SnapshotError> {
        self.ensure_dir().await?;

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))?;

        let path = self.snapshot_path(&snapshot.user_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))?;

        Ok(())
    }

    async fn delete_context_snapshot(&self, user: &UserId) -> Result<(), SnapshotError> {
        match fs::remove_file(self.snapshot_path(user)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::IoError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use serde_json::json;
    use tempfile::TempDir;

    fn snapshot(user: &str) -> ContextSnapshot {
        let mut session_data = serde_json::Map::new();
        session_data.insert("listed_poll_ids".into(), json!([]));
        ContextSnapshot {
            user_id: UserId::new(user).unwrap(),
            state: Some(json!({"type": "poll_creation", "step": "topic"})),
            session_data,
            entities: Default::default(),
            last_intent: None,
            version: 3,
            updated_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn save_and_load_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let saved = snapshot("user@example.com");

        store.upsert_context_snapshot(&saved).await.unwrap();
        let loaded = store
            .load_context_snapshot(&saved.user_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));
        let user = UserId::new("ghost").unwrap();
        assert!(store.load_context_snapshot(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let saved = snapshot("u1");
        store.upsert_context_snapshot(&saved).await.unwrap();

        store.delete_context_snapshot(&saved.user_id).await.unwrap();
        store.delete_context_snapshot(&saved.user_id).await.unwrap();
        assert!(store.load_context_snapshot(&saved.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_deserialization_error() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let user = UserId::new("u1").unwrap();
        std::fs::write(dir.path().join("u1.json"), "{not json").unwrap();

        let err = store.load_context_snapshot(&user).await.unwrap_err();
        assert!(matches!(err, SnapshotError::DeserializationFailed(_)));
    }

    #[test]
    fn file_stem_escapes_path_characters() {
        let user = UserId::new("../a b").unwrap();
        assert_eq!(file_stem(&user), "%2e%2e%2fa%20b");
    }
}
