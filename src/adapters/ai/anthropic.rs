//! Anthropic backend - `GenerativeBackend` over the Messages API.
//!
//! ```ignore
//! let config = AnthropicConfig::new(api_key).with_model("claude-3-5-haiku-latest");
//! let backend = AnthropicBackend::new(config)?;
//! ```
//!
//! A single attempt per call. Retries and timeouts belong to the request queue.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{BackendError, BackendInfo, GenerativeBackend, Prompt};

use super::http_errors::{classify_status, classify_transport};

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic backend.
#[derive(Debug)]
pub struct AnthropicConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    /// Transport timeout; the queue applies its own deadline on top.
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "claude-3-5-haiku-latest".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

pub struct AnthropicBackend {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::unavailable(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn to_request(&self, prompt: &Prompt) -> MessagesRequest {
        MessagesRequest {
            model: self.config.model.clone(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: prompt.text.clone(),
            }],
            system: prompt.system.clone(),
            max_tokens: prompt.max_tokens,
            temperature: Some(prompt.temperature),
        }
    }
}

#[async_trait]
impl GenerativeBackend for AnthropicBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&self.to_request(prompt))
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &headers, &body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::unavailable(format!("malformed response: {}", e)))?;

        Ok(parsed.text())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo::new("anthropic", &self.config.model)
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

impl MessagesResponse {
    /// Concatenated text blocks.
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PromptPurpose;

    #[test]
    fn config_builder_works() {
        let config = AnthropicConfig::new("test-key")
            .with_model("claude-3-opus-20240229")
            .with_base_url("https://custom.api.com/")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.model, "claude-3-opus-20240229");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.api_key(), "test-key");

        let backend = AnthropicBackend::new(config).unwrap();
        assert_eq!(backend.messages_url(), "https://custom.api.com/v1/messages");
    }

    #[test]
    fn request_carries_system_and_limits() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("k")).unwrap();
        let prompt = Prompt::new(PromptPurpose::Naturalize, "Say hi")
            .with_system("Be brief")
            .with_max_tokens(60);
        let json = serde_json::to_value(backend.to_request(&prompt)).unwrap();

        assert_eq!(json["system"], "Be brief");
        assert_eq!(json["max_tokens"], 60);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Say hi");
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let raw = r#"{"content":[{"type":"text","text":"Hello "},{"type":"tool_use"},{"type":"text","text":"there"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text(), "Hello there");
    }
}
