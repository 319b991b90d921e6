//! Scripted generative backend for tests and offline runs.
//!
//! Responses are consumed in order; once the script is empty every call
//! gets the fallback (unavailable by default). Calls are recorded so tests
//! can assert on prompts and call counts.
//!
//! ```ignore
//! let backend = MockBackend::new()
//!     .with_response("1. Which pizza topping wins?")
//!     .with_error(BackendError::throttled(5));
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::ports::{BackendError, BackendInfo, GenerativeBackend, Prompt};

#[derive(Debug, Clone)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<Result<String, BackendError>>>>,
    fallback: Result<String, BackendError>,
    delay: Duration,
    calls: Arc<Mutex<Vec<Prompt>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Poisoning only happens if a test panicked mid-call; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Err(BackendError::unavailable("mock script exhausted")),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend that is always down.
    pub fn unavailable() -> Self {
        Self::new()
    }

    /// Answers every call with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new().with_fallback(Ok(text.into()))
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(text.into()));
        self
    }

    pub fn with_error(self, error: BackendError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    pub fn with_fallback(mut self, fallback: Result<String, BackendError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Simulated latency per call, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, BackendError> {
        lock(&self.calls).push(prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = lock(&self.script).pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo::new("mock", "scripted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PromptPurpose;

    fn prompt() -> Prompt {
        Prompt::new(PromptPurpose::Converse, "hi")
    }

    #[tokio::test]
    async fn script_is_consumed_in_order_then_fallback() {
        let backend = MockBackend::new()
            .with_response("first")
            .with_error(BackendError::throttled(3));

        assert_eq!(backend.complete(&prompt()).await.unwrap(), "first");
        assert_eq!(
            backend.complete(&prompt()).await.unwrap_err(),
            BackendError::throttled(3)
        );
        assert!(backend.complete(&prompt()).await.is_err());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn always_repeats() {
        let backend = MockBackend::always("same");
        for _ in 0..3 {
            assert_eq!(backend.complete(&prompt()).await.unwrap(), "same");
        }
        assert_eq!(backend.prompts()[0].text, "hi");
    }
}
