//! Console driver: one line in, one reply out.
//!
//! Runs on PostgreSQL when `POLL_ASSISTANT__DATABASE__URL` is set and on
//! in-memory adapters otherwise.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use poll_assistant::adapters::ai::{AnthropicBackend, AnthropicConfig, OpenAIBackend, OpenAIConfig};
use poll_assistant::adapters::memory::{
    InMemoryChatHistory, InMemoryPollRepository, InMemorySnapshotStore, StaticRoleProvider,
};
use poll_assistant::adapters::postgres::{
    PostgresChatHistory, PostgresPollRepository, PostgresRoleProvider, PostgresSnapshotStore,
};
use poll_assistant::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
use poll_assistant::adapters::storage::FileSnapshotStore;
use poll_assistant::application::{ChatAssistant, ContextStore, ContextStoreConfig, RequestQueue};
use poll_assistant::config::{AiConfig, AiProvider, AppConfig, QueueConfig, RuntimeConfig};
use poll_assistant::domain::conversation::UserRole;
use poll_assistant::domain::foundation::UserId;
use poll_assistant::ports::{
    ChatHistoryRepository, ContextSnapshotStore, GenerativeBackend, PollRepository, RoleProvider,
};

const EVICTION_INTERVAL: Duration = Duration::from_secs(15 * 60);

struct Persistence {
    polls: Arc<dyn PollRepository>,
    history: Arc<dyn ChatHistoryRepository>,
    snapshots: Arc<dyn ContextSnapshotStore>,
    roles: Arc<dyn RoleProvider>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;
    init_tracing(&config.runtime);

    info!(
        environment = ?config.runtime.environment,
        provider = ?config.ai.provider,
        database = config.database.is_some(),
        "Starting poll assistant"
    );

    let persistence = persistence(&config).await?;
    let queue = backend(&config.ai)?.map(|backend| spawn_queue(backend, &config.queue));

    let contexts = Arc::new(ContextStore::new(
        persistence.snapshots,
        persistence.roles,
        persistence.history,
        ContextStoreConfig {
            state_ttl_hours: config.assistant.state_ttl_hours,
            history_limit: config.assistant.history_limit,
        },
    ));

    let evictor = Arc::clone(&contexts);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            evictor.evict_idle().await;
        }
    });

    let assistant = ChatAssistant::new(persistence.polls, contexts, queue, config.assistant.clone());

    let user_name = std::env::var("POLL_ASSISTANT_USER").unwrap_or_else(|_| "console".to_string());
    let user = UserId::new(user_name).context("POLL_ASSISTANT_USER must not be empty")?;

    println!("Poll assistant ready. Type a message, or Ctrl-D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = assistant.handle_message(&user, &line).await;
        println!("{}\n", reply.content());
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn init_tracing(runtime: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&runtime.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    // Logs go to stderr so replies stay readable on stdout.
    if runtime.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn persistence(config: &AppConfig) -> anyhow::Result<Persistence> {
    if let Some(db) = &config.database {
        let pool = PgPoolOptions::new()
            .min_connections(db.min_connections)
            .max_connections(db.max_connections)
            .acquire_timeout(db.acquire_timeout())
            .connect(&db.url)
            .await
            .context("connecting to PostgreSQL")?;
        if db.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("running migrations")?;
            info!("Migrations applied");
        }
        return Ok(Persistence {
            polls: Arc::new(PostgresPollRepository::new(pool.clone())),
            history: Arc::new(PostgresChatHistory::new(pool.clone())),
            snapshots: Arc::new(PostgresSnapshotStore::new(pool.clone())),
            roles: Arc::new(PostgresRoleProvider::new(pool)),
        });
    }

    warn!("No database configured, polls live in memory for this session");
    let snapshots: Arc<dyn ContextSnapshotStore> = match &config.assistant.context_dir {
        Some(dir) => Arc::new(FileSnapshotStore::new(dir)),
        None => Arc::new(InMemorySnapshotStore::new()),
    };
    Ok(Persistence {
        polls: Arc::new(InMemoryPollRepository::new()),
        history: Arc::new(InMemoryChatHistory::new()),
        snapshots,
        roles: Arc::new(StaticRoleProvider::new(UserRole::Admin)),
    })
}

fn backend(ai: &AiConfig) -> anyhow::Result<Option<Arc<dyn GenerativeBackend>>> {
    let backend: Arc<dyn GenerativeBackend> = match ai.provider {
        AiProvider::None => return Ok(None),
        AiProvider::Anthropic => {
            let key = ai
                .anthropic_api_key
                .as_ref()
                .context("anthropic api key missing")?;
            let mut config = AnthropicConfig::new(key.expose_secret().clone()).with_timeout(ai.timeout());
            if let Some(model) = &ai.model {
                config = config.with_model(model.clone());
            }
            if let Some(url) = &ai.base_url {
                config = config.with_base_url(url.clone());
            }
            Arc::new(AnthropicBackend::new(config)?)
        }
        AiProvider::OpenAI => {
            let key = ai.openai_api_key.as_ref().context("openai api key missing")?;
            let mut config = OpenAIConfig::new(key.expose_secret().clone()).with_timeout(ai.timeout());
            if let Some(model) = &ai.model {
                config = config.with_model(model.clone());
            }
            if let Some(url) = &ai.base_url {
                config = config.with_base_url(url.clone());
            }
            Arc::new(OpenAIBackend::new(config)?)
        }
    };
    Ok(Some(backend))
}

fn spawn_queue(backend: Arc<dyn GenerativeBackend>, queue: &QueueConfig) -> RequestQueue {
    let limiter = InMemoryRateLimiter::new(RateLimitConfig::backend_only(
        queue.requests_per_window,
        queue.window_secs,
    ));
    RequestQueue::spawn(backend, Arc::new(limiter), queue)
}
