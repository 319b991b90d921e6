//! Conversation behaviour settings

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssistantConfig {
    /// Flow states idle longer than this are discarded
    #[serde(default = "default_state_ttl_hours")]
    pub state_ttl_hours: i64,

    /// Messages kept in the in-context window
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Ask the backend to classify low-confidence idle messages
    #[serde(default = "default_true")]
    pub ai_intent_fallback: bool,

    /// Let the backend write reply intros
    #[serde(default = "default_true")]
    pub naturalize: bool,

    /// Longer inbound messages are truncated
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    /// Directory for JSON context snapshots when no database is configured
    pub context_dir: Option<PathBuf>,
}

impl AssistantConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.state_ttl_hours <= 0 {
            return Err(ValidationError::MustBePositive("assistant.state_ttl_hours"));
        }
        if self.history_limit == 0 {
            return Err(ValidationError::MustBePositive("assistant.history_limit"));
        }
        if self.max_message_len == 0 {
            return Err(ValidationError::MustBePositive("assistant.max_message_len"));
        }
        Ok(())
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            state_ttl_hours: default_state_ttl_hours(),
            history_limit: default_history_limit(),
            ai_intent_fallback: true,
            naturalize: true,
            max_message_len: default_max_message_len(),
            context_dir: None,
        }
    }
}

fn default_state_ttl_hours() -> i64 {
    24
}

fn default_history_limit() -> usize {
    20
}

fn default_max_message_len() -> usize {
    2000
}

fn default_true() -> bool {
    true
}
