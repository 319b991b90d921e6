//! Application configuration
//!
//! Settings are read from environment variables with the `POLL_ASSISTANT`
//! prefix; nested values are separated by a double underscore.
//!
//! ```no_run
//! use poll_assistant::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod assistant;
mod database;
mod error;
mod queue;
mod runtime;

pub use ai::{AiConfig, AiProvider};
pub use assistant::AssistantConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use queue::QueueConfig;
pub use runtime::{Environment, RuntimeConfig};

use serde::Deserialize;

/// Root configuration. Every section has defaults, so an empty environment
/// yields a template-only assistant on in-memory storage.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// PostgreSQL. Absent means in-memory adapters.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Load configuration from the environment (and `.env` when present).
    ///
    /// - `POLL_ASSISTANT__DATABASE__URL=...` -> `database.url`
    /// - `POLL_ASSISTANT__QUEUE__WINDOW_SECS=30` -> `queue.window_secs`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("POLL_ASSISTANT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.runtime.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.ai.validate()?;
        self.queue.validate()?;
        self.assistant.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.runtime.is_production()
    }
}
