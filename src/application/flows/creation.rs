//! Poll creation: `category -> topic -> options -> confirm`.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::domain::conversation::{
    keys, ConversationContext, ConversationState, CreationDraft, CreationState, CreationStep,
    FlowData, FlowErrorKind, FlowResult, FlowState, Intent, IntentType,
};
use crate::domain::foundation::{StateMachine, UserId};
use crate::domain::poll::{
    fallback_options, fallback_topics, parse_index_selection, parse_option_list,
    parse_suggestions, validate_options, validate_title, Category, NewPoll, MAX_SUGGESTIONS,
    MIN_SUGGESTIONS, MIN_TITLE_LEN,
};
use crate::ports::{Prompt, PromptPurpose};

use super::{forbidden, quota_hint, FlowController, FlowServices, SAVE_FAILED};

/// A topic longer than this is accepted even without a question mark.
const DIRECT_TOPIC_LEN: usize = 10;

pub struct PollCreationFlow {
    services: FlowServices,
}

#[async_trait]
impl FlowController for PollCreationFlow {
    async fn handle_intent(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        if !context.is_admin() {
            return forbidden();
        }

        let current = context.current_state.as_ref().and_then(|state| match &state.flow {
            FlowState::PollCreation(creation) => Some((state, creation)),
            _ => None,
        });

        match current {
            None => self.start(intent, context).await,
            Some((state, creation)) => {
                debug!(user_id = %context.user_id, step = creation.step.as_str(), intent = %intent.kind, "Creation step");
                let draft = creation.draft.clone();
                match creation.step {
                    CreationStep::Category => self.category_step(intent, state, draft),
                    CreationStep::Topic => self.topic_step(intent, context, state, draft).await,
                    CreationStep::Options => self.options_step(intent, context, state, draft).await,
                    CreationStep::Confirm => self.confirm_step(intent, context, state, draft).await,
                }
            }
        }
    }
}

impl PollCreationFlow {
    pub fn new(services: FlowServices) -> Self {
        Self { services }
    }

    async fn start(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        let mut category = intent.text(keys::CATEGORY).and_then(|c| c.parse::<Category>().ok());

        if category.is_none() {
            if let Some(subject) = intent.text(keys::SUBJECT) {
                category = self.services.classify_category(&context.user_id, subject).await;
                if category.is_none() {
                    debug!(user_id = %context.user_id, "Category not inferred, showing menu");
                }
            }
        }

        match category {
            Some(category) => {
                info!(user_id = %context.user_id, category = category.as_str(), "Poll creation started at topic");
                let state = CreationState {
                    step: CreationStep::Topic,
                    draft: CreationDraft {
                        category: Some(category),
                        ..CreationDraft::default()
                    },
                };
                FlowResult::reply(FlowData::TopicPrompt { category })
                    .with_state(ConversationState::creation(state))
            }
            None => {
                info!(user_id = %context.user_id, "Poll creation started");
                FlowResult::reply(FlowData::CategoryMenu)
                    .with_state(ConversationState::creation(CreationState::default()))
            }
        }
    }

    fn category_step(
        &self,
        intent: &Intent,
        state: &ConversationState,
        mut draft: CreationDraft,
    ) -> FlowResult {
        let Some(category) = intent.text(keys::CATEGORY).and_then(|c| c.parse::<Category>().ok())
        else {
            return FlowResult::reprompt(
                "Please choose one of the categories below.",
                FlowData::CategoryMenu,
            );
        };

        draft.category = Some(category);
        advance(state, CreationStep::Category, CreationStep::Topic, draft)
            .map(|next| FlowResult::reply(FlowData::TopicPrompt { category }).with_state(next))
            .unwrap_or_else(restart)
    }

    async fn topic_step(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        state: &ConversationState,
        mut draft: CreationDraft,
    ) -> FlowResult {
        let Some(category) = draft.category else {
            return restart();
        };

        match intent.kind {
            IntentType::RequestSuggestions => {
                let (suggestions, hint) = self.topic_suggestions(&context.user_id, category).await;
                draft.suggested_topics = suggestions.clone();
                let mut result = FlowResult::reply(FlowData::TopicSuggestions {
                    category,
                    suggestions,
                })
                .with_state(state.advance(FlowState::PollCreation(CreationState {
                    step: CreationStep::Topic,
                    draft,
                })));
                if let Some(hint) = hint {
                    result = result.with_message(hint);
                }
                result
            }
            IntentType::NumericSelection => {
                let picked = super::pick(&draft.suggested_topics, intent.number(keys::NUMBER)).cloned();
                match picked {
                    Some(topic) => self.accept_topic(state, draft, topic),
                    None => FlowResult::reprompt(
                        "That number isn't on the list. Pick one of the suggestions or type your own question.",
                        topic_prompt(category, &draft),
                    ),
                }
            }
            _ => {
                let text = intent.raw_text.trim();
                let len = text.chars().count();
                if len < MIN_TITLE_LEN {
                    return FlowResult::reprompt(
                        "That's a bit short for a poll question. Please write the full question.",
                        topic_prompt(category, &draft),
                    );
                }
                if len <= DIRECT_TOPIC_LEN && !text.ends_with('?') {
                    return FlowResult::reprompt(
                        "Could you phrase that as a question, for example \"Which pizza topping is best?\"",
                        topic_prompt(category, &draft),
                    );
                }
                match validate_title(text) {
                    Ok(topic) => self.accept_topic(state, draft, topic),
                    Err(e) => FlowResult::reprompt(
                        format!("That question can't be used: {}.", e),
                        topic_prompt(category, &draft),
                    ),
                }
            }
        }
    }

    fn accept_topic(
        &self,
        state: &ConversationState,
        mut draft: CreationDraft,
        topic: String,
    ) -> FlowResult {
        draft.topic = Some(topic.clone());
        draft.suggested_topics.clear();
        advance(state, CreationStep::Topic, CreationStep::Options, draft)
            .map(|next| FlowResult::reply(FlowData::OptionsPrompt { topic }).with_state(next))
            .unwrap_or_else(restart)
    }

    async fn options_step(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        state: &ConversationState,
        mut draft: CreationDraft,
    ) -> FlowResult {
        let Some(topic) = draft.topic.clone() else {
            return restart();
        };

        let options = match intent.kind {
            IntentType::RequestSuggestions => {
                let (suggestions, hint) = self.option_suggestions(&context.user_id, &topic).await;
                draft.suggested_options = suggestions.clone();
                let mut result = FlowResult::reply(FlowData::OptionSuggestions { topic, suggestions })
                    .with_state(state.advance(FlowState::PollCreation(CreationState {
                        step: CreationStep::Options,
                        draft,
                    })));
                if let Some(hint) = hint {
                    result = result.with_message(hint);
                }
                return result;
            }
            IntentType::NumericSelection => {
                match parse_index_selection(&intent.raw_text, draft.suggested_options.len()) {
                    Some(indices) => indices
                        .into_iter()
                        .map(|i| draft.suggested_options[i].clone())
                        .collect(),
                    None if draft.suggested_options.is_empty() => {
                        return FlowResult::reprompt(
                            "There are no suggestions to pick from yet. Type your options or say \"suggest\".",
                            FlowData::OptionsPrompt { topic },
                        )
                    }
                    None => {
                        return FlowResult::reprompt(
                            "Please pick numbers from the list, like \"1, 3\" or \"all\".",
                            FlowData::OptionSuggestions {
                                topic,
                                suggestions: draft.suggested_options.clone(),
                            },
                        )
                    }
                }
            }
            _ => intent
                .list(keys::OPTIONS)
                .map(<[String]>::to_vec)
                .unwrap_or_else(|| parse_option_list(&intent.raw_text)),
        };

        if let Err(e) = validate_options(&options) {
            return FlowResult::reprompt(
                format!("Those options don't work yet: {}.", e),
                FlowData::OptionsPrompt { topic },
            );
        }

        let category = draft.category.unwrap_or(Category::Other);
        draft.options = options.clone();
        draft.suggested_options.clear();
        advance(state, CreationStep::Options, CreationStep::Confirm, draft)
            .map(|next| {
                FlowResult::reply(FlowData::CreationPreview {
                    category,
                    topic,
                    options,
                })
                .with_state(next)
            })
            .unwrap_or_else(restart)
    }

    async fn confirm_step(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        state: &ConversationState,
        draft: CreationDraft,
    ) -> FlowResult {
        let (Some(category), Some(topic)) = (draft.category, draft.topic.clone()) else {
            return restart();
        };

        match intent.kind {
            IntentType::Confirm => self.persist(&context.user_id, category, topic, draft.options).await,
            IntentType::Edit => advance(state, CreationStep::Confirm, CreationStep::Category, CreationDraft::default())
                .map(|next| {
                    FlowResult::reply(FlowData::CategoryMenu)
                        .with_message("No problem, let's start the poll again.")
                        .with_state(next)
                })
                .unwrap_or_else(restart),
            IntentType::Decline => FlowResult::finished(FlowData::Cancelled),
            _ => FlowResult::reprompt(
                "Please reply \"confirm\", \"edit\" or \"cancel\".",
                FlowData::CreationPreview {
                    category,
                    topic,
                    options: draft.options,
                },
            ),
        }
    }

    /// Inserts the poll, then its options; a failed option insert removes
    /// the poll again. State is kept on failure so "confirm" can be retried.
    async fn persist(
        &self,
        user: &UserId,
        category: Category,
        topic: String,
        options: Vec<String>,
    ) -> FlowResult {
        let new_poll = match NewPoll::new(user.clone(), topic, category, None) {
            Ok(poll) => poll,
            Err(e) => return restart_with(format!("The question is no longer valid: {}.", e)),
        };

        let polls = &self.services.polls;
        let poll = match polls.insert_poll(new_poll).await {
            Ok(poll) => poll,
            Err(e) => {
                error!(user_id = %user, error = %e, "Poll insert failed");
                return FlowResult::failure(FlowErrorKind::PersistenceFailure, SAVE_FAILED);
            }
        };

        if let Err(e) = polls.insert_options(poll.id, &options).await {
            warn!(poll_id = %poll.id, error = %e, "Option insert failed, removing poll");
            if let Err(cleanup) = polls.delete_poll(poll.id).await {
                error!(poll_id = %poll.id, error = %cleanup, "Compensating poll delete failed");
            }
            return FlowResult::failure(FlowErrorKind::PersistenceFailure, SAVE_FAILED);
        }

        info!(user_id = %user, poll_id = %poll.id, options = options.len(), "Poll created");
        FlowResult::finished(FlowData::PollCreated {
            poll_id: poll.id,
            title: poll.title,
            category: poll.category,
            options,
        })
        .naturalized()
    }

    async fn topic_suggestions(
        &self,
        user: &UserId,
        category: Category,
    ) -> (Vec<String>, Option<String>) {
        let prompt = Prompt::new(
            PromptPurpose::TopicSuggestions,
            format!(
                "Suggest {} short, engaging poll questions in the {} category. One question per line, no numbering, no extra text.",
                MAX_SUGGESTIONS, category
            ),
        )
        .with_system("You write concise poll questions.");

        match self.services.generate(user, prompt).await {
            Ok(text) => {
                let parsed = parse_suggestions(&text, MAX_SUGGESTIONS);
                if parsed.len() >= MIN_SUGGESTIONS {
                    return (parsed, None);
                }
                warn!(user_id = %user, "Topic suggestions unusable, using defaults");
                (fallback_topics(category), None)
            }
            Err(e) => {
                debug!(user_id = %user, error = %e, "Topic suggestions from defaults");
                (fallback_topics(category), quota_hint(&e))
            }
        }
    }

    async fn option_suggestions(&self, user: &UserId, topic: &str) -> (Vec<String>, Option<String>) {
        let prompt = Prompt::new(
            PromptPurpose::OptionSuggestions,
            format!(
                "Suggest {} distinct answer options for the poll question \"{}\". One option per line, each under 8 words, no numbering, no extra text.",
                MAX_SUGGESTIONS, topic
            ),
        )
        .with_system("You write concise poll answer options.");

        match self.services.generate(user, prompt).await {
            Ok(text) => {
                let parsed = parse_suggestions(&text, MAX_SUGGESTIONS);
                if parsed.len() >= MIN_SUGGESTIONS && validate_options(&parsed).is_ok() {
                    return (parsed, None);
                }
                warn!(user_id = %user, "Option suggestions unusable, using defaults");
                (fallback_options(topic), None)
            }
            Err(e) => {
                debug!(user_id = %user, error = %e, "Option suggestions from defaults");
                (fallback_options(topic), quota_hint(&e))
            }
        }
    }
}

fn topic_prompt(category: Category, draft: &CreationDraft) -> FlowData {
    if draft.suggested_topics.is_empty() {
        FlowData::TopicPrompt { category }
    } else {
        FlowData::TopicSuggestions {
            category,
            suggestions: draft.suggested_topics.clone(),
        }
    }
}

/// Next state for a declared step edge.
fn advance(
    state: &ConversationState,
    from: CreationStep,
    to: CreationStep,
    draft: CreationDraft,
) -> Option<ConversationState> {
    let step = from.transition_to(to).ok()?;
    Some(state.advance(FlowState::PollCreation(CreationState { step, draft })))
}

/// Resets to the first step after finding a draft that cannot continue.
fn restart() -> FlowResult {
    restart_with("Something was missing from your draft, so let's start again.")
}

fn restart_with(detail: impl Into<String>) -> FlowResult {
    FlowResult::reprompt(detail, FlowData::CategoryMenu)
        .with_state(ConversationState::creation(CreationState::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockBackend;
    use crate::adapters::memory::InMemoryPollRepository;
    use crate::adapters::rate_limiter::InMemoryRateLimiter;
    use crate::application::request_queue::RequestQueue;
    use crate::config::QueueConfig;
    use crate::domain::conversation::UserRole;
    use crate::domain::foundation::UserId;
    use crate::domain::classifier::PatternIntentClassifier;
    use std::sync::Arc;

    struct Harness {
        flow: PollCreationFlow,
        polls: InMemoryPollRepository,
        context: ConversationContext,
        classifier: PatternIntentClassifier,
    }

    impl Harness {
        fn new(queue: Option<RequestQueue>) -> Self {
            let polls = InMemoryPollRepository::new();
            let services = FlowServices::new(Arc::new(polls.clone()), queue);
            Self {
                flow: PollCreationFlow::new(services),
                polls,
                context: ConversationContext::new(UserId::new("admin").unwrap(), UserRole::Admin),
                classifier: PatternIntentClassifier::new(),
            }
        }

        /// Classifies and handles one message, applying the state change.
        async fn say(&mut self, text: &str) -> FlowResult {
            let intent = self.classifier.classify(text, &self.context);
            let result = self.flow.handle_intent(&intent, &self.context).await;
            if result.should_end_flow {
                self.context.current_state = None;
            } else if let Some(state) = result.context_update.as_ref().and_then(|u| u.state.clone()) {
                self.context.current_state = Some(state);
            }
            self.context.last_intent = Some(intent);
            result
        }

        fn draft(&self) -> CreationDraft {
            match &self.context.current_state.as_ref().unwrap().flow {
                FlowState::PollCreation(state) => state.draft.clone(),
                other => panic!("unexpected flow {:?}", other),
            }
        }
    }

    fn backend_queue(backend: MockBackend) -> RequestQueue {
        RequestQueue::spawn(
            Arc::new(backend),
            Arc::new(InMemoryRateLimiter::with_defaults()),
            &QueueConfig::default(),
        )
    }

    #[tokio::test]
    async fn subject_category_skips_to_topic() {
        let mut h = Harness::new(None);
        let result = h.say("create a poll about best programming language").await;
        assert_eq!(result.next_step, Some("topic"));
        assert_eq!(h.draft().category, Some(Category::Technology));
    }

    #[tokio::test]
    async fn backend_classifies_category_when_keywords_miss() {
        let mut h = Harness::new(Some(backend_queue(MockBackend::always("Sports"))));
        let result = h.say("create a poll about the thing on saturday").await;
        assert_eq!(result.next_step, Some("topic"));
        assert_eq!(h.draft().category, Some(Category::Sports));
    }

    #[tokio::test]
    async fn unknown_category_without_backend_shows_menu() {
        let mut h = Harness::new(None);
        let result = h.say("create a poll about the thing on saturday").await;
        assert_eq!(result.data, Some(FlowData::CategoryMenu));
        assert_eq!(result.next_step, Some("category"));
    }

    #[tokio::test]
    async fn non_admin_is_refused() {
        let mut h = Harness::new(None);
        h.context.role = UserRole::User;
        let result = h.say("create a poll").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::Forbidden));
        assert!(result.context_update.is_none());
    }

    #[tokio::test]
    async fn short_topic_is_rejected_without_advancing() {
        let mut h = Harness::new(None);
        h.say("create a poll").await;
        h.say("2").await;
        let result = h.say("Tea").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::InvalidStateInput));
        assert!(result.context_update.is_none());
        assert_eq!(h.context.step_name(), "topic");
    }

    #[tokio::test]
    async fn suggestions_fall_back_and_can_be_picked() {
        let mut h = Harness::new(None);
        h.say("create a poll about pizza toppings and food").await;
        let result = h.say("suggest some ideas").await;
        let Some(FlowData::TopicSuggestions { suggestions, .. }) = result.data else {
            panic!("expected suggestions");
        };
        assert!(suggestions.len() >= MIN_SUGGESTIONS);

        let result = h.say("2").await;
        assert_eq!(result.next_step, Some("options"));
        assert_eq!(h.draft().topic.as_deref(), Some(suggestions[1].as_str()));
    }

    #[tokio::test]
    async fn duplicate_options_leave_state_unchanged() {
        let mut h = Harness::new(None);
        h.say("create a poll about best programming language").await;
        h.say("Which language do you enjoy most?").await;
        let before = h.context.current_state.clone();

        let result = h.say("Red, red, Blue").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::InvalidStateInput));
        assert!(result.context_update.is_none());
        assert_eq!(h.context.current_state, before);
    }

    #[tokio::test]
    async fn option_suggestions_selected_by_number() {
        let backend = MockBackend::new().with_response("Rust\nGo\nPython\nZig");
        let mut h = Harness::new(Some(backend_queue(backend)));
        h.context.current_state = Some(ConversationState::creation(CreationState {
            step: CreationStep::Options,
            draft: CreationDraft {
                category: Some(Category::Technology),
                topic: Some("Favourite systems language?".into()),
                ..CreationDraft::default()
            },
        }));

        h.say("give me some suggestions").await;
        let result = h.say("1, 3").await;
        assert_eq!(result.next_step, Some("confirm"));
        assert_eq!(h.draft().options, vec!["Rust", "Python"]);
    }

    #[tokio::test]
    async fn confirm_persists_options_in_order_and_ends() {
        let mut h = Harness::new(None);
        h.say("create a poll about best programming language").await;
        h.say("What is the best programming language?").await;
        h.say("Python, Rust, Go, TypeScript").await;
        let result = h.say("confirm").await;

        assert!(result.should_end_flow);
        let polls = h.polls.all().await;
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].option_texts(), vec!["Python", "Rust", "Go", "TypeScript"]);
        assert_eq!(polls[0].category, Category::Technology);
    }

    #[tokio::test]
    async fn failed_option_insert_removes_poll_and_keeps_confirm() {
        let mut h = Harness::new(None);
        h.say("create a poll about best programming language").await;
        h.say("What is the best programming language?").await;
        h.say("Python, Rust").await;

        h.polls.fail_option_inserts(true);
        let result = h.say("yes").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::PersistenceFailure));
        assert_eq!(h.polls.poll_count().await, 0);
        assert_eq!(h.context.step_name(), "confirm");

        h.polls.fail_option_inserts(false);
        assert!(h.say("yes").await.should_end_flow);
        assert_eq!(h.polls.poll_count().await, 1);
    }

    #[tokio::test]
    async fn edit_at_confirm_restarts_with_empty_draft() {
        let mut h = Harness::new(None);
        h.say("create a poll about best programming language").await;
        h.say("What is the best programming language?").await;
        h.say("Python, Rust").await;

        let result = h.say("edit").await;
        assert_eq!(result.next_step, Some("category"));
        assert_eq!(h.draft(), CreationDraft::default());
    }

    #[tokio::test]
    async fn corrupt_draft_restarts_safely() {
        let mut h = Harness::new(None);
        h.context.current_state = Some(ConversationState::creation(CreationState {
            step: CreationStep::Confirm,
            draft: CreationDraft::default(),
        }));
        let result = h.say("confirm").await;
        assert_eq!(result.next_step, Some("category"));
        assert_eq!(h.polls.poll_count().await, 0);
    }
}
