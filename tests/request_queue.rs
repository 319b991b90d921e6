//! Request queue behaviour against a scripted backend.
//!
//! Time is paused so the fixed window can be crossed deterministically.

use std::sync::Arc;
use std::time::Duration;

use poll_assistant::adapters::ai::MockBackend;
use poll_assistant::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig, WindowLimits};
use poll_assistant::application::{QueueError, RequestQueue};
use poll_assistant::config::QueueConfig;
use poll_assistant::domain::foundation::UserId;
use poll_assistant::ports::{Prompt, PromptPurpose};

fn queue_with(backend: Arc<MockBackend>, per_window: u32) -> RequestQueue {
    let config = QueueConfig {
        requests_per_window: per_window,
        window_secs: 60,
        ..QueueConfig::default()
    };
    let limiter = InMemoryRateLimiter::new(RateLimitConfig::backend_only(per_window, 60));
    RequestQueue::spawn(backend, Arc::new(limiter), &config)
}

fn prompt() -> Prompt {
    Prompt::new(PromptPurpose::Converse, "hello")
}

#[tokio::test(start_paused = true)]
async fn window_overflow_never_reaches_backend_and_recovers() {
    let backend = Arc::new(MockBackend::always("hi there"));
    let queue = queue_with(Arc::clone(&backend), 3);

    for _ in 0..3 {
        assert_eq!(queue.enqueue(prompt()).await.unwrap(), "hi there");
    }
    let rejected = queue.enqueue(prompt()).await;
    assert!(matches!(rejected, Err(QueueError::RateLimited { retry_after_secs }) if retry_after_secs > 0));
    assert_eq!(backend.call_count(), 3);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(queue.enqueue(prompt()).await.unwrap(), "hi there");
    assert_eq!(backend.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn one_chatty_user_does_not_exhaust_the_shared_quota() {
    let backend = Arc::new(MockBackend::always("ok"));
    let limits = RateLimitConfig {
        backend: WindowLimits::new(10, 60),
        per_user: WindowLimits::new(2, 60),
    };
    let queue = RequestQueue::spawn(
        backend.clone(),
        Arc::new(InMemoryRateLimiter::new(limits)),
        &QueueConfig::default(),
    );
    let chatty = UserId::new("chatty").unwrap();
    let quiet = UserId::new("quiet").unwrap();

    assert!(queue.enqueue_for(&chatty, prompt()).await.is_ok());
    assert!(queue.enqueue_for(&chatty, prompt()).await.is_ok());
    assert!(matches!(
        queue.enqueue_for(&chatty, prompt()).await,
        Err(QueueError::RateLimited { .. })
    ));

    assert_eq!(queue.enqueue_for(&quiet, prompt()).await.unwrap(), "ok");
    assert_eq!(backend.call_count(), 3);
}
