//! In-memory chat log.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::conversation::ChatMessage;
use crate::domain::foundation::UserId;
use crate::ports::{ChatHistoryRepository, RepositoryError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryChatHistory {
    logs: Arc<RwLock<HashMap<UserId, Vec<ChatMessage>>>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full log for a user, oldest first.
    pub async fn messages(&self, user: &UserId) -> Vec<ChatMessage> {
        self.logs.read().await.get(user).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatHistoryRepository for InMemoryChatHistory {
    async fn append_chat_message(
        &self,
        user: &UserId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        self.logs
            .write()
            .await
            .entry(user.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn fetch_recent_chat_messages(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let logs = self.logs.read().await;
        let log = logs.get(user).map(Vec::as_slice).unwrap_or_default();
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_returns_tail_in_order() {
        let history = InMemoryChatHistory::new();
        let user = UserId::new("u1").unwrap();
        for text in ["one", "two", "three"] {
            history
                .append_chat_message(&user, &ChatMessage::user(text).unwrap())
                .await
                .unwrap();
        }

        let recent = history.fetch_recent_chat_messages(&user, 2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn unknown_user_has_empty_history() {
        let history = InMemoryChatHistory::new();
        let user = UserId::new("nobody").unwrap();
        assert!(history.fetch_recent_chat_messages(&user, 5).await.unwrap().is_empty());
    }
}
