//! Application layer - the conversational pipeline.
//!
//! - `assistant` - entry point for one inbound message
//! - `context_store` - per-user context cache over the snapshot port
//! - `flows` - one controller per task
//! - `request_queue` - serialized, rate-limited backend access
//! - `response_generator` - templates plus optional generated prose

pub mod assistant;
pub mod context_store;
pub mod flows;
pub mod request_queue;
pub mod response_generator;

pub use assistant::{AssistantError, ChatAssistant};
pub use context_store::{ContextStore, ContextStoreConfig, ContextStoreError};
pub use request_queue::{QueueError, RequestQueue};
pub use response_generator::ResponseGenerator;
