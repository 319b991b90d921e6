//! Generative backend configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Generative backend configuration
#[derive(Debug, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,

    pub anthropic_api_key: Option<Secret<String>>,

    pub openai_api_key: Option<Secret<String>>,

    /// Model override for the selected provider
    pub model: Option<String>,

    /// Base URL override, e.g. a local OpenAI-compatible server
    pub base_url: Option<String>,

    /// Transport timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Which backend to talk to. `None` runs fully on templates.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Anthropic,
    OpenAI,
    #[default]
    None,
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_anthropic(&self) -> bool {
        has_key(&self.anthropic_api_key)
    }

    pub fn has_openai(&self) -> bool {
        has_key(&self.openai_api_key)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.provider {
            AiProvider::Anthropic if !self.has_anthropic() => {
                Err(ValidationError::MissingRequired("AI__ANTHROPIC_API_KEY"))
            }
            AiProvider::OpenAI if !self.has_openai() => {
                Err(ValidationError::MissingRequired("AI__OPENAI_API_KEY"))
            }
            _ if self.timeout_secs == 0 => Err(ValidationError::MustBePositive("ai.timeout_secs")),
            _ => Ok(()),
        }
    }
}

fn has_key(key: &Option<Secret<String>>) -> bool {
    key.as_ref().is_some_and(|k| !k.expose_secret().is_empty())
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            anthropic_api_key: None,
            openai_api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_template_only() {
        let config = AiConfig::default();
        assert_eq!(config.provider, AiProvider::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn selected_provider_needs_its_key() {
        let config = AiConfig {
            provider: AiProvider::Anthropic,
            openai_api_key: Some(Secret::new("sk-xxx".to_string())),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("AI__ANTHROPIC_API_KEY"))
        );
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let config = AiConfig {
            provider: AiProvider::OpenAI,
            openai_api_key: Some(Secret::new(String::new())),
            ..Default::default()
        };
        assert!(!config.has_openai());
        assert!(config.validate().is_err());
    }

    #[test]
    fn key_is_redacted_in_debug() {
        let config = AiConfig {
            anthropic_api_key: Some(Secret::new("sk-ant-secret".to_string())),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("sk-ant-secret"));
    }
}
