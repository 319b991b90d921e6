//! Turns a [`FlowResult`] into the assistant's reply.
//!
//! Every result has a deterministic rendering. Generated text is only ever
//! layered on top of it: a `Naturalize` hint lets the backend write the intro
//! sentence and a `Converse` hint lets it answer free-form. Any failure or
//! unusable output falls back to the template.

use tracing::{debug, warn};

use crate::domain::conversation::{
    templates::{self, CLARIFICATION, GENERIC_APOLOGY},
    ChatMessage, ChatRole, ConversationContext, FlowErrorKind, FlowResult, Intent, RenderHint,
};
use crate::domain::foundation::{MessageId, Timestamp};
use crate::ports::{Prompt, PromptPurpose};

use super::request_queue::{QueueError, RequestQueue};

/// Longest generated intro accepted.
pub const MAX_INTRO_CHARS: usize = 240;

/// Longest generated free-form answer accepted.
pub const MAX_ANSWER_CHARS: usize = 1200;

/// Messages of history shown to the backend for a free-form answer.
const CONVERSE_HISTORY: usize = 6;

const SYSTEM: &str = "You are a friendly assistant inside a polling app. Users create polls, edit their polls, vote and browse polls by chatting with you. Be brief and never invent poll ids, counts or options.";

pub struct ResponseGenerator {
    queue: Option<RequestQueue>,
    naturalize: bool,
}

impl ResponseGenerator {
    pub fn new(queue: Option<RequestQueue>, naturalize: bool) -> Self {
        Self { queue, naturalize }
    }

    /// Deterministic only.
    pub fn verbatim() -> Self {
        Self::new(None, false)
    }

    pub async fn render(
        &self,
        result: &FlowResult,
        context: &ConversationContext,
        intent: &Intent,
    ) -> ChatMessage {
        let text = match (result.render, &self.queue) {
            (RenderHint::Converse, Some(queue)) => self.converse(queue, context, intent).await,
            (RenderHint::Naturalize, Some(queue)) if self.naturalize && result.success => {
                self.naturalized(queue, result, context).await
            }
            _ => verbatim_text(result),
        };
        assistant_message(text)
    }

    async fn naturalized(
        &self,
        queue: &RequestQueue,
        result: &FlowResult,
        context: &ConversationContext,
    ) -> String {
        let Some(data) = &result.data else {
            return verbatim_text(result);
        };
        let rendered = templates::render(data);
        let prompt = Prompt::new(
            PromptPurpose::Naturalize,
            format!(
                "Rewrite this as one short, warm sentence for the user. Reply with that sentence only.\n\nSentence: {}\n\nIt introduces:\n{}",
                rendered.intro, rendered.body
            ),
        )
        .with_system(SYSTEM)
        .with_max_tokens(80)
        .with_temperature(0.7);

        let intro = match queue.enqueue_with_retry(&context.user_id, prompt).await {
            Ok(text) => accept_intro(&text).unwrap_or_else(|| {
                debug!(user_id = %context.user_id, "Generated intro rejected");
                rendered.intro.clone()
            }),
            Err(e) => {
                warn!(user_id = %context.user_id, error = %e, "Naturalization fell back to template");
                rendered.intro.clone()
            }
        };

        let message = result.message.as_deref().unwrap_or_default();
        templates::join_nonempty(&[message, &intro, &rendered.body])
    }

    async fn converse(
        &self,
        queue: &RequestQueue,
        context: &ConversationContext,
        intent: &Intent,
    ) -> String {
        let start = context.history.len().saturating_sub(CONVERSE_HISTORY);
        let transcript = context.history[start..]
            .iter()
            .map(|m| format!("{}: {}", m.role().as_str(), m.content()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = Prompt::new(
            PromptPurpose::Converse,
            format!(
                "Conversation so far:\n{}\n\nAnswer the user's last message: {}\nIf it is unrelated to polls, answer briefly and mention what you can help with.",
                transcript, intent.raw_text
            ),
        )
        .with_system(SYSTEM)
        .with_max_tokens(300)
        .with_temperature(0.7);

        match queue.enqueue_with_retry(&context.user_id, prompt).await {
            Ok(text) => accept_answer(&text).unwrap_or_else(|| CLARIFICATION.to_string()),
            Err(QueueError::RateLimited { retry_after_secs })
            | Err(QueueError::Throttled { retry_after_secs }) => {
                templates::retry_later(retry_after_secs)
            }
            Err(e) => {
                warn!(user_id = %context.user_id, error = %e, "Free-form answer fell back to clarification");
                CLARIFICATION.to_string()
            }
        }
    }
}

/// Template text for a result: lead message, intro, body.
pub fn verbatim_text(result: &FlowResult) -> String {
    if let Some(FlowErrorKind::QuotaExceeded { retry_after_secs }) = result.error_kind() {
        return templates::retry_later(*retry_after_secs);
    }
    let rendered = result.data.as_ref().map(templates::render);
    let message = result.message.as_deref().unwrap_or_default();
    match &rendered {
        Some(r) => templates::join_nonempty(&[message, &r.intro, &r.body]),
        None => templates::join_nonempty(&[message]),
    }
}

fn accept_intro(text: &str) -> Option<String> {
    let intro = text.trim().trim_matches('"').trim();
    let usable = !intro.is_empty() && intro.chars().count() <= MAX_INTRO_CHARS && !intro.contains('\n');
    usable.then(|| intro.to_string())
}

fn accept_answer(text: &str) -> Option<String> {
    let answer = text.trim();
    (!answer.is_empty() && answer.chars().count() <= MAX_ANSWER_CHARS).then(|| answer.to_string())
}

/// Builds the reply message. Blank text becomes the generic apology.
pub fn assistant_message(text: String) -> ChatMessage {
    let text = if text.trim().is_empty() {
        GENERIC_APOLOGY.to_string()
    } else {
        text
    };
    ChatMessage::reconstitute(MessageId::new(), ChatRole::Assistant, text, Timestamp::now())
}
