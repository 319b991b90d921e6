//! PostgreSQL implementation of ChatHistoryRepository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::conversation::{ChatMessage, ChatRole};
use crate::domain::foundation::{MessageId, Timestamp, UserId};
use crate::ports::{ChatHistoryRepository, RepositoryError};

/// Append-only chat log in `chat_messages`.
#[derive(Clone)]
pub struct PostgresChatHistory {
    pool: PgPool,
}

impl PostgresChatHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatHistoryRepository for PostgresChatHistory {
    async fn append_chat_message(
        &self,
        user: &UserId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, user_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id().as_uuid())
        .bind(user.as_str())
        .bind(message.role().as_str())
        .bind(message.content())
        .bind(message.timestamp().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(format!("Failed to append chat message: {}", e)))?;

        Ok(())
    }

    async fn fetch_recent_chat_messages(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, role, content, created_at
            FROM chat_messages
            WHERE user_id = $1
            ORDER BY seq DESC
            LIMIT $2
            "#,
        )
        .bind(user.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(format!("Failed to fetch chat messages: {}", e)))?;

        let mut messages = rows
            .into_iter()
            .map(|row| {
                let role: String = row.get("role");
                let role = ChatRole::parse(&role).ok_or_else(|| {
                    RepositoryError::Storage(format!("Unknown chat role: {}", role))
                })?;
                Ok(ChatMessage::reconstitute(
                    MessageId::from_uuid(row.get("id")),
                    role,
                    row.get("content"),
                    Timestamp::from_datetime(row.get("created_at")),
                ))
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        messages.reverse();
        Ok(messages)
    }
}
