//! Generative Backend Port - text generation behind the request queue.
//!
//! The assistant uses a backend for three things: topic suggestions,
//! option suggestions, and wording of replies. Every call travels through
//! the request queue, never directly from a flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for text generation.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Produce a single completion for `prompt`.
    async fn complete(&self, prompt: &Prompt) -> Result<String, BackendError>;

    /// Provider name and model, for logging.
    fn backend_info(&self) -> BackendInfo;
}

/// What a prompt is for. Drives defaults and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPurpose {
    TopicSuggestions,
    OptionSuggestions,
    Naturalize,
    Converse,
    ClassifyIntent,
}

impl PromptPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptPurpose::TopicSuggestions => "topic_suggestions",
            PromptPurpose::OptionSuggestions => "option_suggestions",
            PromptPurpose::Naturalize => "naturalize",
            PromptPurpose::Converse => "converse",
            PromptPurpose::ClassifyIntent => "classify_intent",
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub purpose: PromptPurpose,
    pub system: Option<String>,
    pub text: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Prompt {
    pub fn new(purpose: PromptPurpose, text: impl Into<String>) -> Self {
        Self {
            purpose,
            system: None,
            text: text.into(),
            max_tokens: 300,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub model: String,
}

impl BackendInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Backend failures, classified as throttled or unavailable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Quota exhausted at the provider.
    #[error("throttled: retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl BackendError {
    pub fn throttled(retry_after_secs: u64) -> Self {
        Self::Throttled { retry_after_secs }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            BackendError::Throttled { retry_after_secs } => Some(*retry_after_secs),
            BackendError::Unavailable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builder_sets_fields() {
        let prompt = Prompt::new(PromptPurpose::TopicSuggestions, "Suggest topics")
            .with_system("Be brief")
            .with_max_tokens(120)
            .with_temperature(0.2);

        assert_eq!(prompt.purpose, PromptPurpose::TopicSuggestions);
        assert_eq!(prompt.system.as_deref(), Some("Be brief"));
        assert_eq!(prompt.max_tokens, 120);
        assert_eq!(prompt.temperature, 0.2);
    }

    #[test]
    fn only_throttled_carries_retry_after() {
        assert_eq!(BackendError::throttled(12).retry_after_secs(), Some(12));
        assert_eq!(BackendError::unavailable("down").retry_after_secs(), None);
    }
}
