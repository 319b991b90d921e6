//! PostgreSQL implementation of ContextSnapshotStore.
//!
//! The snapshot is stored as JSONB next to its version so operators can
//! inspect stuck conversations with plain SQL.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::conversation::ContextSnapshot;
use crate::domain::foundation::UserId;
use crate::ports::{ContextSnapshotStore, SnapshotError};

#[derive(Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextSnapshotStore for PostgresSnapshotStore {
    async fn load_context_snapshot(
        &self,
        user: &UserId,
    ) -> Result<Option<ContextSnapshot>, SnapshotError> {
        let row = sqlx::query("SELECT snapshot FROM context_snapshots WHERE user_id = $1")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SnapshotError::DatabaseError(format!("Failed to load snapshot: {}", e)))?;

        match row {
            Some(row) => {
                let raw: serde_json::Value = row.get("snapshot");
                serde_json::from_value(raw)
                    .map(Some)
                    .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
            }
            None => Ok(None),
        }
    }

    async fn upsert_context_snapshot(&self, snapshot: &ContextSnapshot) -> Result<(), SnapshotError> {
        let raw = serde_json::to_value(snapshot)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO context_snapshots (user_id, snapshot, version, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(snapshot.user_id.as_str())
        .bind(raw)
        .bind(snapshot.version as i64)
        .bind(snapshot.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| SnapshotError::DatabaseError(format!("Failed to upsert snapshot: {}", e)))?;

        Ok(())
    }

    async fn delete_context_snapshot(&self, user: &UserId) -> Result<(), SnapshotError> {
        sqlx::query("DELETE FROM context_snapshots WHERE user_id = $1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| SnapshotError::DatabaseError(format!("Failed to delete snapshot: {}", e)))?;
        Ok(())
    }
}
