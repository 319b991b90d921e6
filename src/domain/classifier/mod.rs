//! Pattern intent classifier.
//!
//! First-pass, regex based intent and entity extraction. Evaluation order:
//!
//! 1. Reset keywords (always win).
//! 2. The state-scoped recognizer of the active flow.
//! 3. Ordered global rules. While a flow is active only a confident
//!    flow-entry rule can interrupt it (topic switch); other text becomes
//!    `ProvideInput` for the current step. Steps that take open text are
//!    only interrupted by a short leading command.
//! 4. Confirmation words while idle, then a low-confidence `General`.

mod confirmation;
mod end_date;
mod option_edit;
mod recognizers;
mod reset;
mod rules;

pub use confirmation::{Confirmation, ConfirmationRecognizer};
pub use end_date::{parse_end_date, EndDateRequest, DEFAULT_EXTENSION_DAYS};
pub use option_edit::{detect_option_edit, OptionEdit};
pub use recognizers::{
    bare_number, is_suggestion_request, poll_id_in, recognizer_for, RecognizerTools,
    StateRecognizer,
};
pub use reset::detect_reset;
pub use rules::{is_switch_command, IntentRule, DEFAULT_RULES};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::conversation::{keys, ConversationContext, Intent, IntentType, CONFIDENT};
use crate::domain::foundation::Timestamp;
use crate::domain::poll::CategoryDetector;

static SUBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:about|on|for|regarding|asking)\s+(.+?)[\s?.!]*$")
        .expect("subject pattern must compile")
});

static COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\b").expect("count pattern must compile"));

/// Classifies a message against the user's context.
#[derive(Debug, Default)]
pub struct PatternIntentClassifier {
    categories: CategoryDetector,
    confirmation: ConfirmationRecognizer,
}

impl PatternIntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, message: &str, context: &ConversationContext) -> Intent {
        self.classify_at(message, context, Timestamp::now())
    }

    /// Same as [`classify`](Self::classify) with an explicit clock for date expressions.
    pub fn classify_at(&self, message: &str, context: &ConversationContext, now: Timestamp) -> Intent {
        let text = message.trim();
        if text.is_empty() {
            return Intent::general(message);
        }

        if let Some(reset) = detect_reset(text) {
            return reset;
        }

        if let Some(state) = &context.current_state {
            let tools = RecognizerTools::new(now);
            let scoped = recognizer_for(&state.flow).recognize(text, &tools);
            if let Some(intent) = &scoped {
                if intent.kind != IntentType::ProvideInput {
                    return intent.clone();
                }
            }
            if let Some(global) = self.match_rules(text, context) {
                let interrupts = !state.flow.expects_free_text() || is_switch_command(text);
                if global.kind.is_flow_entry() && interrupts {
                    return global.with_notes("topic_switch");
                }
            }
            return scoped.unwrap_or_else(|| Intent::new(IntentType::ProvideInput, 0.6, text));
        }

        if let Some(global) = self.match_rules(text, context) {
            return global;
        }

        if let Some(decision) = self.confirmation.recognize(text) {
            let kind = match decision {
                Confirmation::Affirm => IntentType::Confirm,
                Confirmation::Decline => IntentType::Decline,
                Confirmation::Edit => IntentType::Edit,
            };
            return Intent::new(kind, CONFIDENT, text);
        }

        Intent::general(text)
    }

    fn match_rules(&self, text: &str, context: &ConversationContext) -> Option<Intent> {
        let anchored = has_anchor(context);
        DEFAULT_RULES
            .iter()
            .filter(|rule| rule.confidence >= CONFIDENT)
            .filter(|rule| anchored || !rule.requires_anchor())
            .find(|rule| rule.matches(text))
            .map(|rule| self.extract(rule.kind, rule.confidence, text))
    }

    fn extract(&self, kind: IntentType, confidence: f32, text: &str) -> Intent {
        let mut intent = Intent::new(kind, confidence, text);
        match kind {
            IntentType::CreatePoll | IntentType::UpdatePoll => {
                let subject = SUBJECT
                    .captures(text)
                    .map(|caps| caps[1].trim().to_string())
                    .filter(|s| !s.is_empty());
                if kind == IntentType::CreatePoll {
                    if let Some(category) = self.categories.detect(subject.as_deref().unwrap_or(text)) {
                        intent = intent.with_text(keys::CATEGORY, category.as_str());
                    }
                }
                if let Some(id) = poll_id_in(text) {
                    intent = intent.with_text(keys::POLL_REF, id.to_string());
                }
                if let Some(subject) = subject {
                    intent = intent.with_text(keys::SUBJECT, subject);
                }
            }
            IntentType::ListRecentPolls => {
                if let Some(n) = COUNT.captures(text).and_then(|c| c[1].parse::<i64>().ok()) {
                    intent = intent.with_number(keys::COUNT, n);
                }
            }
            IntentType::NumericSelection => {
                if let Some(n) = bare_number(text) {
                    intent = intent.with_number(keys::NUMBER, n);
                }
            }
            _ => {}
        }
        intent
    }
}

/// A bare number only means something after a listing.
fn has_anchor(context: &ConversationContext) -> bool {
    let listed_before = context
        .last_intent
        .as_ref()
        .is_some_and(|i| i.kind.is_listing() || i.kind == IntentType::NumericSelection);
    listed_before || !context.listed_poll_ids().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{
        ConversationState, CreationDraft, CreationState, CreationStep, UpdateDraft, UpdateState,
        UpdateStep, UserRole, VotingState,
    };
    use crate::domain::foundation::UserId;

    fn idle() -> ConversationContext {
        ConversationContext::new(UserId::new("u1").unwrap(), UserRole::Admin)
    }

    fn in_state(state: ConversationState) -> ConversationContext {
        let mut context = idle();
        context.current_state = Some(state);
        context
    }

    fn creation(step: CreationStep) -> ConversationContext {
        in_state(ConversationState::creation(CreationState {
            step,
            draft: CreationDraft::default(),
        }))
    }

    fn update(step: UpdateStep) -> ConversationContext {
        in_state(ConversationState::update(UpdateState {
            step,
            draft: UpdateDraft::default(),
        }))
    }

    #[test]
    fn create_extracts_subject_and_category() {
        let classifier = PatternIntentClassifier::new();
        let intent = classifier.classify("create a poll about best programming language", &idle());
        assert_eq!(intent.kind, IntentType::CreatePoll);
        assert_eq!(intent.text(keys::CATEGORY), Some("technology"));
        assert_eq!(intent.text(keys::SUBJECT), Some("best programming language"));
    }

    #[test]
    fn reset_wins_in_every_step() {
        let classifier = PatternIntentClassifier::new();
        let contexts = vec![
            idle(),
            creation(CreationStep::Category),
            creation(CreationStep::Topic),
            creation(CreationStep::Options),
            creation(CreationStep::Confirm),
            update(UpdateStep::SelectPoll),
            update(UpdateStep::SelectField),
            update(UpdateStep::UpdateOptions),
            update(UpdateStep::ConfirmUpdate),
            in_state(ConversationState::voting(VotingState::default())),
        ];
        for context in &contexts {
            let intent = classifier.classify("start over", context);
            assert_eq!(intent.kind, IntentType::Reset, "step {}", context.step_name());
            assert!(intent.kind.clears_state());
        }
    }

    #[test]
    fn unmatched_text_is_general_with_low_confidence() {
        let intent = PatternIntentClassifier::new().classify("the sky is lovely", &idle());
        assert_eq!(intent.kind, IntentType::General);
        assert!(intent.confidence >= 0.2 && intent.confidence <= 0.3);
    }

    #[test]
    fn bare_number_without_anchor_is_general() {
        let intent = PatternIntentClassifier::new().classify("2", &idle());
        assert_eq!(intent.kind, IntentType::General);
    }

    #[test]
    fn bare_number_after_listing_is_selection() {
        let classifier = PatternIntentClassifier::new();
        let mut context = idle();
        context.last_intent = Some(Intent::new(IntentType::ListPolls, 0.9, "show polls"));
        let intent = classifier.classify("2", &context);
        assert_eq!(intent.kind, IntentType::NumericSelection);
        assert_eq!(intent.number(keys::NUMBER), Some(2));
    }

    #[test]
    fn flow_entry_in_flow_is_topic_switch() {
        let classifier = PatternIntentClassifier::new();
        let intent = classifier.classify("show my polls", &creation(CreationStep::Options));
        assert_eq!(intent.kind, IntentType::ListMyPolls);
        assert_eq!(intent.notes.as_deref(), Some("topic_switch"));
    }

    #[test]
    fn questions_mentioning_polls_stay_with_the_step() {
        let classifier = PatternIntentClassifier::new();
        let intent = classifier.classify(
            "Should we run a new survey for the football team?",
            &creation(CreationStep::Topic),
        );
        assert_eq!(intent.kind, IntentType::ProvideInput);

        let intent = classifier.classify(
            "Which team should we show in the polls page?",
            &update(UpdateStep::UpdateTitle),
        );
        assert_eq!(intent.kind, IntentType::ProvideInput);
        assert_eq!(intent.notes, None);
    }

    #[test]
    fn long_text_still_switches_from_menu_steps() {
        let intent = PatternIntentClassifier::new().classify(
            "actually I would rather see the list of active polls",
            &update(UpdateStep::SelectField),
        );
        assert_eq!(intent.kind, IntentType::ListPolls);
        assert_eq!(intent.notes.as_deref(), Some("topic_switch"));
    }

    #[test]
    fn in_flow_free_text_is_provide_input() {
        let classifier = PatternIntentClassifier::new();
        let intent = classifier.classify("Which pizza topping is best?", &creation(CreationStep::Topic));
        assert_eq!(intent.kind, IntentType::ProvideInput);
    }

    #[test]
    fn idle_confirm_is_not_a_flow_entry() {
        let intent = PatternIntentClassifier::new().classify("confirm", &idle());
        assert_eq!(intent.kind, IntentType::Confirm);
        assert!(!intent.kind.is_flow_entry());
    }

    #[test]
    fn recent_count_is_extracted() {
        let intent = PatternIntentClassifier::new().classify("show the 3 latest polls", &idle());
        assert_eq!(intent.kind, IntentType::ListRecentPolls);
        assert_eq!(intent.number(keys::COUNT), Some(3));
    }
}
