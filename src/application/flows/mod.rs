//! Flow controllers.
//!
//! Each controller owns one task. It takes the classified intent and the
//! current context and returns a [`FlowResult`]; bad input never raises, it
//! re-prompts. A controller does not write context itself. The assistant
//! applies the result's context update after rendering.

mod creation;
mod general;
mod listing;
mod update;
mod voting;

pub use creation::PollCreationFlow;
pub use general::GeneralFlow;
pub use listing::PollListingFlow;
pub use update::PollUpdateFlow;
pub use voting::VotingFlow;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::domain::conversation::{
    templates, ConversationContext, FlowErrorKind, FlowResult, Intent,
};
use crate::domain::foundation::UserId;
use crate::domain::poll::{Category, CategoryDetector, PollSummary};
use crate::ports::{PollRepository, Prompt, PromptPurpose, RepositoryError};

use super::request_queue::{QueueError, RequestQueue};

/// Common contract of all flows.
#[async_trait]
pub trait FlowController: Send + Sync {
    async fn handle_intent(&self, intent: &Intent, context: &ConversationContext) -> FlowResult;
}

/// Collaborators shared by the flows.
#[derive(Clone)]
pub struct FlowServices {
    pub polls: Arc<dyn PollRepository>,
    /// `None` runs every flow on deterministic fallbacks.
    pub queue: Option<RequestQueue>,
}

impl FlowServices {
    pub fn new(polls: Arc<dyn PollRepository>, queue: Option<RequestQueue>) -> Self {
        Self { polls, queue }
    }

    /// Sends a prompt through the queue on behalf of `user`.
    pub async fn generate(&self, user: &UserId, prompt: Prompt) -> Result<String, QueueError> {
        match &self.queue {
            Some(queue) => queue.enqueue_with_retry(user, prompt).await,
            None => Err(QueueError::Unavailable("no backend configured".to_string())),
        }
    }

    /// Asks the backend for a category; `None` on any failure.
    pub async fn classify_category(&self, user: &UserId, subject: &str) -> Option<Category> {
        let names: Vec<&str> = Category::all().iter().map(Category::label).collect();
        let prompt = Prompt::new(
            PromptPurpose::ClassifyIntent,
            format!(
                "Pick the single best category for a poll about: \"{}\".\nCategories: {}.\nAnswer with the category name only.",
                subject,
                names.join(", ")
            ),
        )
        .with_max_tokens(10)
        .with_temperature(0.0);

        let answer = self.generate(user, prompt).await.ok()?;
        let detector = CategoryDetector::new();
        detector
            .parse_choice(&answer)
            .or_else(|| detector.detect(&answer))
    }
}

pub(crate) const ADMIN_ONLY: &str =
    "Sorry, only admins can create or edit polls. You can still browse polls and vote.";

pub(crate) fn forbidden() -> FlowResult {
    FlowResult::failure(FlowErrorKind::Forbidden, ADMIN_ONLY).ending()
}

pub(crate) const SAVE_FAILED: &str =
    "I couldn't save that just now. Nothing was lost, please try again.";

/// Maps a repository failure into a result. Missing and foreign polls look
/// the same to the user.
pub(crate) fn storage_failure(action: &str, err: RepositoryError) -> FlowResult {
    match err {
        RepositoryError::PollNotFound | RepositoryError::OptionNotFound => {
            FlowResult::failure(FlowErrorKind::NotFound, "I couldn't find that poll.").ending()
        }
        other => {
            error!(action, error = %other, "Persistence failure");
            FlowResult::failure(FlowErrorKind::PersistenceFailure, SAVE_FAILED)
        }
    }
}

/// Message for a backend quota rejection, if `err` is one.
pub(crate) fn quota_hint(err: &QueueError) -> Option<String> {
    err.retry_after_secs().map(templates::retry_later)
}

/// Case-insensitive title match among `polls`: an exact title wins,
/// otherwise a unique substring match.
pub(crate) fn match_title<'a>(polls: &'a [PollSummary], text: &str) -> Option<&'a PollSummary> {
    let needle = text.trim().trim_matches(['"', '\'']).to_lowercase();
    if needle.len() < 3 {
        return None;
    }
    if let Some(exact) = polls.iter().find(|p| p.title.to_lowercase() == needle) {
        return Some(exact);
    }
    let mut partial = polls.iter().filter(|p| {
        let title = p.title.to_lowercase();
        title.contains(&needle) || needle.contains(&title)
    });
    match (partial.next(), partial.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// One-based index into `items`.
pub(crate) fn pick<T>(items: &[T], number: Option<i64>) -> Option<&T> {
    let index = usize::try_from(number?).ok()?.checked_sub(1)?;
    items.get(index)
}
