//! Serialized access to the generative backend.
//!
//! A single worker task drains a bounded channel, so requests are answered
//! in FIFO order with at most one backend call in flight. Quota is checked
//! when a request is enqueued; rejected requests never reach the backend.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::domain::foundation::UserId;
use crate::ports::{
    BackendError, GenerativeBackend, Prompt, RateLimitKey, RateLimitResult, RateLimiter,
};

/// Longest pause between throttled attempts.
const MAX_RETRY_DELAY_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("local quota exhausted, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("request queue is full")]
    QueueFull,

    #[error("backend throttled, retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("backend call timed out")]
    Timeout,

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl QueueError {
    /// Seconds the caller should wait, for quota-style errors.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            QueueError::RateLimited { retry_after_secs }
            | QueueError::Throttled { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<BackendError> for QueueError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Throttled { retry_after_secs } => QueueError::Throttled { retry_after_secs },
            BackendError::Unavailable { message } => QueueError::Unavailable(message),
        }
    }
}

struct QueuedRequest {
    prompt: Prompt,
    reply: oneshot::Sender<Result<String, QueueError>>,
}

/// Handle to the backend worker. Cloning shares the same worker.
#[derive(Clone)]
pub struct RequestQueue {
    sender: mpsc::Sender<QueuedRequest>,
    limiter: Arc<dyn RateLimiter>,
    backend_key: RateLimitKey,
    retry_ceiling: u32,
}

impl RequestQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(
        backend: Arc<dyn GenerativeBackend>,
        limiter: Arc<dyn RateLimiter>,
        config: &QueueConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.max_pending);
        let info = backend.backend_info();
        let backend_key = RateLimitKey::backend(&info.name);

        info!(
            backend = %info.name,
            model = %info.model,
            max_pending = config.max_pending,
            "Starting request queue worker"
        );
        tokio::spawn(worker(backend, receiver, config.request_timeout()));

        Self {
            sender,
            limiter,
            backend_key,
            retry_ceiling: config.retry_ceiling,
        }
    }

    /// Queues one prompt against the shared backend quota.
    pub async fn enqueue(&self, prompt: Prompt) -> Result<String, QueueError> {
        self.submit(None, prompt).await
    }

    /// Queues one prompt, charging the user's quota and then the shared one.
    /// A request refused by the queue or the shared window costs the user nothing.
    pub async fn enqueue_for(&self, user: &UserId, prompt: Prompt) -> Result<String, QueueError> {
        self.submit(Some(RateLimitKey::user(user)), prompt).await
    }

    /// Like [`enqueue_for`](Self::enqueue_for), retrying backend throttling
    /// up to the configured ceiling. Local quota rejections are not retried.
    pub async fn enqueue_with_retry(
        &self,
        user: &UserId,
        prompt: Prompt,
    ) -> Result<String, QueueError> {
        let mut attempt = 0;
        loop {
            match self.enqueue_for(user, prompt.clone()).await {
                Err(QueueError::Throttled { retry_after_secs }) if attempt < self.retry_ceiling => {
                    attempt += 1;
                    let delay = retry_after_secs.clamp(1, MAX_RETRY_DELAY_SECS);
                    warn!(
                        purpose = prompt.purpose.as_str(),
                        attempt,
                        delay_secs = delay,
                        "Backend throttled, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                other => return other,
            }
        }
    }

    async fn admit(&self, key: RateLimitKey) -> Result<(), QueueError> {
        let result = self
            .limiter
            .check(key.clone())
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        match result {
            RateLimitResult::Allowed(_) => Ok(()),
            RateLimitResult::Denied(denied) => {
                debug!(key = %key, retry_after_secs = denied.retry_after_secs, "Quota exhausted");
                Err(QueueError::RateLimited {
                    retry_after_secs: denied.retry_after_secs,
                })
            }
        }
    }

    async fn submit(
        &self,
        user_key: Option<RateLimitKey>,
        prompt: Prompt,
    ) -> Result<String, QueueError> {
        let permit = self.sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => QueueError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => {
                QueueError::Unavailable("request queue stopped".to_string())
            }
        })?;

        if let Some(key) = &user_key {
            self.admit(key.clone()).await?;
        }
        if let Err(err) = self.admit(self.backend_key.clone()).await {
            if let Some(key) = user_key {
                if let Err(e) = self.limiter.release(key.clone()).await {
                    warn!(key = %key, error = %e, "Could not return user quota");
                }
            }
            return Err(err);
        }

        let (reply, response) = oneshot::channel();
        permit.send(QueuedRequest { prompt, reply });
        response
            .await
            .map_err(|_| QueueError::Unavailable("request dropped by worker".to_string()))?
    }
}

async fn worker(
    backend: Arc<dyn GenerativeBackend>,
    mut receiver: mpsc::Receiver<QueuedRequest>,
    timeout: Duration,
) {
    while let Some(request) = receiver.recv().await {
        let purpose = request.prompt.purpose.as_str();
        debug!(purpose, "Calling backend");

        let result = match tokio::time::timeout(timeout, backend.complete(&request.prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => {
                warn!(purpose, error = %err, "Backend call failed");
                Err(QueueError::from(err))
            }
            Err(_) => {
                warn!(purpose, timeout_secs = timeout.as_secs(), "Backend call timed out");
                Err(QueueError::Timeout)
            }
        };

        // The caller may have given up; nothing to do then.
        let _ = request.reply.send(result);
    }
    info!("Request queue worker stopped");
}
