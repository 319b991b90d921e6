//! Chat message entity.
//!
//! Messages are immutable records of user/assistant exchanges. Each message
//! has a role, content, and timestamp, and is appended to the per-user history.

use crate::domain::foundation::{DomainError, MessageId, Timestamp};
use serde::{Deserialize, Serialize};

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// An immutable message in a user's chat history.
///
/// # Invariants
///
/// - `content` is non-empty (validated at construction)
/// - `timestamp` is set at construction and never changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: MessageId,
    role: ChatRole,
    content: String,
    timestamp: Timestamp,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if content is blank
    pub fn new(role: ChatRole, content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation("content", "Message content cannot be empty"));
        }

        Ok(Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: Timestamp::now(),
        })
    }

    pub fn user(content: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(ChatRole::Assistant, content)
    }

    /// Reconstitutes a message from storage without validation.
    pub fn reconstitute(
        id: MessageId,
        role: ChatRole,
        content: String,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            role,
            content,
            timestamp,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        assert!(ChatMessage::user("  ").is_err());
    }

    #[test]
    fn constructors_set_role() {
        assert_eq!(ChatMessage::user("hi").unwrap().role(), ChatRole::User);
        assert!(!ChatMessage::assistant("hello").unwrap().is_user());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChatRole::Assistant).unwrap(), "\"assistant\"");
    }
}
