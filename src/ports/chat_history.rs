//! Chat history port.

use async_trait::async_trait;

use crate::domain::conversation::ChatMessage;
use crate::domain::foundation::UserId;

use super::RepositoryError;

/// Append-only chat log per user.
#[async_trait]
pub trait ChatHistoryRepository: Send + Sync {
    async fn append_chat_message(
        &self,
        user: &UserId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError>;

    /// The last `limit` messages, oldest first.
    async fn fetch_recent_chat_messages(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;
}
