//! Generative backend adapters.
//!
//! - `AnthropicBackend` - Anthropic Messages API
//! - `OpenAIBackend` - OpenAI-compatible Chat Completions
//! - `MockBackend` - scripted responses for tests and offline use

mod anthropic;
mod http_errors;
mod mock;
mod openai;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use mock::MockBackend;
pub use openai::{OpenAIBackend, OpenAIConfig};
