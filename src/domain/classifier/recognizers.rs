//! State-scoped recognizers.
//!
//! While a flow is active its recognizer resolves structured replies for the
//! current step (numbers, field names, confirmations, option edits, dates)
//! before any global rule is tried. A recognizer returning `ProvideInput`
//! is a soft match: a confident global flow-entry rule may still override it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::conversation::{
    keys, CreationState, CreationStep, EntityValue, FlowState, Intent, IntentType, UpdateState,
    UpdateStep, VotingState,
};
use crate::domain::foundation::{PollId, Timestamp};
use crate::domain::poll::{is_index_selection, parse_option_list, CategoryDetector, PollField};

use super::confirmation::{Confirmation, ConfirmationRecognizer};
use super::end_date::parse_end_date;
use super::option_edit::{detect_option_edit, OptionEdit};

static SUGGESTION_REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(suggest|suggestions?|ideas?|recommend|recommendations?|examples?|help me (?:choose|pick|come up|think|decide)|give me some|you (?:pick|choose|decide)|surprise me|no idea|not sure what)\b",
    )
    .expect("suggestion pattern must compile")
});

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:#|no\.?\s*|number\s+|option\s+|poll\s+)?(\d{1,3})\s*[.)]?\s*$")
        .expect("number pattern must compile")
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("uuid pattern must compile")
});

static FIELD_WORDS: Lazy<Vec<(PollField, Regex)>> = Lazy::new(|| {
    let field = |f: PollField, pattern: &str| {
        (f, Regex::new(pattern).expect("field pattern must compile"))
    };
    vec![
        field(PollField::Options, r"(?i)\b(options?|choices?|answers?|items?)\b"),
        field(PollField::Title, r"(?i)\b(title|question|name|heading|wording|rename)\b"),
        field(
            PollField::EndDate,
            r"(?i)\b(end date|date|deadline|expiry|expire|expires|duration|extend|close|closing|end|ends)\b",
        ),
        field(PollField::Category, r"(?i)\b(category|categories|genre|type|topic)\b"),
    ]
});

/// Stateless helpers shared by every recognizer.
#[derive(Debug, Clone, Copy)]
pub struct RecognizerTools {
    pub confirmation: ConfirmationRecognizer,
    pub categories: CategoryDetector,
    pub now: Timestamp,
}

impl RecognizerTools {
    pub fn new(now: Timestamp) -> Self {
        Self {
            confirmation: ConfirmationRecognizer::new(),
            categories: CategoryDetector::new(),
            now,
        }
    }
}

/// Step-aware reply recognition for one flow.
pub trait StateRecognizer {
    fn recognize(&self, text: &str, tools: &RecognizerTools) -> Option<Intent>;
}

/// Picks the recognizer for the active flow.
pub fn recognizer_for(flow: &FlowState) -> &dyn StateRecognizer {
    match flow {
        FlowState::PollCreation(state) => state as &dyn StateRecognizer,
        FlowState::PollUpdate(state) => state as &dyn StateRecognizer,
        FlowState::Voting(state) => state as &dyn StateRecognizer,
    }
}

/// Number typed on its own ("2", "#2", "option 2").
pub fn bare_number(text: &str) -> Option<i64> {
    BARE_NUMBER
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// First poll id mentioned in the text.
pub fn poll_id_in(text: &str) -> Option<PollId> {
    UUID.find(text).and_then(|m| m.as_str().parse().ok())
}

pub fn is_suggestion_request(text: &str) -> bool {
    SUGGESTION_REQUEST.is_match(text)
}

/// Field named in a `select_field` reply.
///
/// `Err(())` when the reply names more than one field.
fn field_reference(text: &str) -> Result<Option<PollField>, ()> {
    if let Some(n) = bare_number(text) {
        return Ok(usize::try_from(n).ok().and_then(PollField::from_menu_number));
    }
    let mut named = FIELD_WORDS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(field, _)| *field);
    match (named.next(), named.next()) {
        (None, _) => Ok(None),
        (Some(field), None) => Ok(Some(field)),
        (Some(_), Some(_)) => Err(()),
    }
}

fn confirmation_intent(text: &str, tools: &RecognizerTools) -> Option<Intent> {
    tools.confirmation.recognize(text).map(|decision| {
        let kind = match decision {
            Confirmation::Affirm => IntentType::Confirm,
            Confirmation::Decline => IntentType::Decline,
            Confirmation::Edit => IntentType::Edit,
        };
        Intent::new(kind, 0.95, text)
    })
}

fn numeric(text: &str, n: i64) -> Intent {
    Intent::new(IntentType::NumericSelection, 0.95, text).with_number(keys::NUMBER, n)
}

fn provide_input(text: &str, confidence: f32) -> Intent {
    Intent::new(IntentType::ProvideInput, confidence, text)
}

fn category_input(text: &str, tools: &RecognizerTools) -> Option<Intent> {
    if let Some(category) = tools.categories.parse_choice(text) {
        return Some(provide_input(text, 1.0).with_text(keys::CATEGORY, category.as_str()));
    }
    tools
        .categories
        .detect(text)
        .map(|category| provide_input(text, 0.85).with_text(keys::CATEGORY, category.as_str()))
}

impl StateRecognizer for CreationState {
    fn recognize(&self, text: &str, tools: &RecognizerTools) -> Option<Intent> {
        match self.step {
            CreationStep::Category => category_input(text, tools),
            CreationStep::Topic => {
                if let Some(n) = bare_number(text) {
                    return Some(numeric(text, n));
                }
                if is_suggestion_request(text) {
                    return Some(Intent::new(IntentType::RequestSuggestions, 0.9, text));
                }
                None
            }
            CreationStep::Options => {
                if is_index_selection(text) || text.trim().eq_ignore_ascii_case("all") {
                    return Some(Intent::new(IntentType::NumericSelection, 0.95, text));
                }
                if is_suggestion_request(text) {
                    return Some(Intent::new(IntentType::RequestSuggestions, 0.9, text));
                }
                let options = parse_option_list(text);
                (!options.is_empty()).then(|| provide_input(text, 0.9).with_list(keys::OPTIONS, options))
            }
            CreationStep::Confirm => confirmation_intent(text, tools),
        }
    }
}

impl StateRecognizer for UpdateState {
    fn recognize(&self, text: &str, tools: &RecognizerTools) -> Option<Intent> {
        match self.step {
            UpdateStep::SelectPoll => {
                if let Some(n) = bare_number(text) {
                    return Some(numeric(text, n));
                }
                poll_id_in(text).map(|id| {
                    provide_input(text, 0.95).with_text(keys::POLL_REF, id.to_string())
                })
            }
            UpdateStep::SelectField => match field_reference(text) {
                Ok(Some(field)) => Some(
                    Intent::new(IntentType::SelectField, 0.95, text)
                        .with_text(keys::FIELD, field.key()),
                ),
                Err(()) => Some(provide_input(text, 0.5).with_notes("ambiguous_field")),
                Ok(None) => detect_option_edit(text)
                    .filter(|edit| edit.mode.is_some() && !edit.options.is_empty())
                    .map(|edit| modify_options_intent(text, edit)),
            },
            UpdateStep::UpdateOptions => detect_option_edit(text).map(|edit| {
                if edit.mode.is_none() {
                    provide_input(text, 0.9).with_list(keys::OPTIONS, edit.options)
                } else {
                    modify_options_intent(text, edit)
                }
            }),
            UpdateStep::UpdateCategory => category_input(text, tools),
            UpdateStep::UpdateEndDate => parse_end_date(text, tools.now).map(|request| {
                let mut intent = Intent::new(IntentType::SetEndDate, 0.95, text)
                    .with_text(keys::END_DATE, request.at.to_string());
                if request.defaulted {
                    intent = intent.with_entity(keys::DEFAULTED, EntityValue::Flag(true));
                }
                intent
            }),
            UpdateStep::UpdateTitle => None,
            UpdateStep::ConfirmUpdate => confirmation_intent(text, tools),
        }
    }
}

fn modify_options_intent(text: &str, edit: OptionEdit) -> Intent {
    let mut intent = Intent::new(IntentType::ModifyOptions, 0.95, text)
        .with_list(keys::OPTIONS, edit.options);
    if let Some(mode) = edit.mode {
        intent = intent.with_text(keys::MODE, mode.as_str());
    }
    if let Some(remembered) = edit.remembered {
        intent = intent.with_text(keys::REMEMBERED, remembered.as_str());
    }
    intent
}

impl StateRecognizer for VotingState {
    fn recognize(&self, text: &str, _tools: &RecognizerTools) -> Option<Intent> {
        if let Some(n) = bare_number(text) {
            return Some(numeric(text, n));
        }
        poll_id_in(text).map(|id| provide_input(text, 0.95).with_text(keys::POLL_REF, id.to_string()))
    }
}
