//! Chat Assistant
//!
//! In-process entry point. One call handles one inbound message end to end:
//! load context, classify, dispatch to a flow, render, persist. Turns for
//! the same user run one at a time. Anything unexpected, including a panic
//! inside a flow, becomes a generic apology instead of reaching the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::AssistantConfig;
use crate::domain::classifier::PatternIntentClassifier;
use crate::domain::conversation::{
    keys, templates::{CLARIFICATION, GENERIC_APOLOGY}, ChatMessage, ConversationContext, FlowResult,
    Intent, IntentType, StateKind,
};
use crate::domain::foundation::UserId;
use crate::domain::poll::CategoryDetector;
use crate::ports::{PollRepository, Prompt, PromptPurpose};

use super::context_store::{ContextStore, ContextStoreError};
use super::flows::{
    FlowController, FlowServices, GeneralFlow, PollCreationFlow, PollListingFlow, PollUpdateFlow,
    VotingFlow,
};
use super::request_queue::RequestQueue;
use super::response_generator::{assistant_message, ResponseGenerator};

/// Below this an idle message may be re-classified by the backend.
const AI_FALLBACK_BELOW: f32 = 0.5;

/// Confidence given to a backend classification.
const AI_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("context store error: {0}")]
    Context(#[from] ContextStoreError),
}

pub struct ChatAssistant {
    contexts: Arc<ContextStore>,
    classifier: PatternIntentClassifier,
    services: FlowServices,
    creation: PollCreationFlow,
    update: PollUpdateFlow,
    listing: PollListingFlow,
    voting: VotingFlow,
    general: GeneralFlow,
    responses: ResponseGenerator,
    config: AssistantConfig,
}

impl ChatAssistant {
    pub fn new(
        polls: Arc<dyn PollRepository>,
        contexts: Arc<ContextStore>,
        queue: Option<RequestQueue>,
        config: AssistantConfig,
    ) -> Self {
        let services = FlowServices::new(polls, queue.clone());
        Self {
            contexts,
            classifier: PatternIntentClassifier::new(),
            creation: PollCreationFlow::new(services.clone()),
            update: PollUpdateFlow::new(services.clone()),
            listing: PollListingFlow::new(services.clone()),
            voting: VotingFlow::new(services.clone()),
            general: GeneralFlow::new(),
            responses: ResponseGenerator::new(queue, config.naturalize),
            services,
            config,
        }
    }

    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    /// Handles one inbound message and returns the reply. Never fails.
    pub async fn handle_message(&self, user: &UserId, text: &str) -> ChatMessage {
        let text: String = text.chars().take(self.config.max_message_len).collect();
        let _turn = self.contexts.lock_user(user).await;

        match AssertUnwindSafe(self.process(user, &text)).catch_unwind().await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!(user_id = %user, error = %e, "Turn failed");
                assistant_message(GENERIC_APOLOGY.to_string())
            }
            Err(_) => {
                error!(user_id = %user, "Turn panicked");
                assistant_message(GENERIC_APOLOGY.to_string())
            }
        }
    }

    async fn process(&self, user: &UserId, text: &str) -> Result<ChatMessage, AssistantError> {
        let mut context = self.contexts.load(user).await?;

        let inbound = match ChatMessage::user(text) {
            Ok(message) => message,
            Err(_) => return Ok(assistant_message(CLARIFICATION.to_string())),
        };
        self.contexts.record_message(&mut context, inbound).await;

        let intent = self.classifier.classify(text, &context);
        let intent = self.refine(intent, &context).await;

        let switching = intent.notes.as_deref() == Some("topic_switch");
        if context.current_state.is_some() && (intent.kind.clears_state() || switching) {
            info!(
                user_id = %user,
                step = context.step_name(),
                intent = %intent.kind,
                "Leaving active flow"
            );
            context.current_state = None;
        }

        let from_step = context.step_name();
        let result = self.route(&intent, &context).handle_intent(&intent, &context).await;
        apply(&mut context, &result);
        context.remember_intent(&intent);

        info!(
            user_id = %user,
            intent = %intent.kind,
            confidence = intent.confidence,
            from = from_step,
            to = context.step_name(),
            success = result.success,
            "Turn handled"
        );

        let reply = self.responses.render(&result, &context, &intent).await;
        self.contexts.record_message(&mut context, reply.clone()).await;

        // The reply reports what already happened; a failed save must not
        // turn a created poll into an apology.
        if let Err(e) = self.contexts.save(&mut context).await {
            error!(user_id = %user, error = %e, "Failed to save conversation context");
        }
        Ok(reply)
    }

    fn route(&self, intent: &Intent, context: &ConversationContext) -> &dyn FlowController {
        match context.state_kind() {
            StateKind::PollCreation => return &self.creation,
            StateKind::PollUpdate => return &self.update,
            StateKind::Voting => return &self.voting,
            StateKind::Idle => {}
        }
        match intent.kind {
            IntentType::CreatePoll => &self.creation,
            IntentType::UpdatePoll => &self.update,
            IntentType::Vote => &self.voting,
            kind if kind.is_listing() => &self.listing,
            IntentType::NumericSelection if !context.listed_poll_ids().is_empty() => &self.listing,
            _ => &self.general,
        }
    }

    /// Lets the backend pick a label for a weak idle classification.
    async fn refine(&self, intent: Intent, context: &ConversationContext) -> Intent {
        let eligible = context.current_state.is_none()
            && intent.confidence < AI_FALLBACK_BELOW
            && self.config.ai_intent_fallback
            && self.services.queue.is_some();
        if !eligible {
            return intent;
        }

        let prompt = Prompt::new(
            PromptPurpose::ClassifyIntent,
            format!(
                "Classify this message from a polling app user into exactly one label: create_poll, update_poll, vote, list_polls, list_my_polls, list_recent_polls, list_voted_polls, greeting, help, general.\nMessage: \"{}\"\nAnswer with the label only.",
                intent.raw_text
            ),
        )
        .with_max_tokens(10)
        .with_temperature(0.0);

        let answer = match self.services.generate(&context.user_id, prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(user_id = %context.user_id, error = %e, "Intent fallback unavailable");
                return intent;
            }
        };
        let Some(kind) = IntentType::from_label(&answer).filter(|k| *k != IntentType::General) else {
            return intent;
        };

        debug!(user_id = %context.user_id, intent = %kind, "Intent classified by backend");
        let mut refined = Intent::new(kind, AI_CONFIDENCE, intent.raw_text.clone()).with_notes("ai_classified");
        refined.entities = intent.entities;
        if kind == IntentType::CreatePoll && refined.text(keys::CATEGORY).is_none() {
            if let Some(category) = CategoryDetector::new().detect(&refined.raw_text) {
                refined = refined.with_text(keys::CATEGORY, category.as_str());
            }
        }
        refined
    }
}

/// Folds a flow result into the context.
fn apply(context: &mut ConversationContext, result: &FlowResult) {
    if let Some(update) = &result.context_update {
        if !result.should_end_flow {
            if let Some(state) = &update.state {
                context.current_state = Some(state.clone());
            }
        }
        context.merge_session_data(update.session_data.clone());
    }
    if result.should_end_flow {
        context.current_state = None;
    }
}
