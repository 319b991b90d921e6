//! Uniform result every flow controller returns.

use serde_json::{Map, Value};
use std::fmt;

use crate::domain::foundation::PollId;
use crate::domain::poll::{Category, Poll, PollField, PollSummary};

use super::intent::OptionEditMode;
use super::state::ConversationState;

/// How the response generator should turn a result into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderHint {
    /// Return the deterministic text as is.
    #[default]
    Verbatim,
    /// Let the backend write a one-sentence intro above the template body.
    Naturalize,
    /// Free-form backend answer with a clarification fallback.
    Converse,
}

/// Error taxonomy recovered into a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowErrorKind {
    ClassificationMiss,
    InvalidStateInput,
    /// Ownership violations are reported as this too.
    NotFound,
    QuotaExceeded { retry_after_secs: u64 },
    PersistenceFailure,
    BackendUnavailable,
    Forbidden,
}

impl fmt::Display for FlowErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowErrorKind::ClassificationMiss => write!(f, "classification_miss"),
            FlowErrorKind::InvalidStateInput => write!(f, "invalid_state_input"),
            FlowErrorKind::NotFound => write!(f, "not_found"),
            FlowErrorKind::QuotaExceeded { .. } => write!(f, "quota_exceeded"),
            FlowErrorKind::PersistenceFailure => write!(f, "persistence_failure"),
            FlowErrorKind::BackendUnavailable => write!(f, "backend_unavailable"),
            FlowErrorKind::Forbidden => write!(f, "forbidden"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub detail: String,
}

/// Which listing produced a poll list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Active,
    Mine,
    Recent { limit: usize },
    Voted,
}

/// What a poll menu is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPurpose {
    Update,
    Vote,
}

/// Structured payload the templates render.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowData {
    CategoryMenu,
    TopicPrompt {
        category: Category,
    },
    TopicSuggestions {
        category: Category,
        suggestions: Vec<String>,
    },
    OptionsPrompt {
        topic: String,
    },
    OptionSuggestions {
        topic: String,
        suggestions: Vec<String>,
    },
    CreationPreview {
        category: Category,
        topic: String,
        options: Vec<String>,
    },
    PollCreated {
        poll_id: PollId,
        title: String,
        category: Category,
        options: Vec<String>,
    },
    PollMenu {
        purpose: MenuPurpose,
        polls: Vec<PollSummary>,
    },
    FieldMenu {
        poll_title: String,
    },
    FieldPrompt {
        field: PollField,
        poll_title: String,
        current: Vec<String>,
    },
    OptionModePrompt {
        current: Vec<String>,
        remembered: Option<OptionEditMode>,
    },
    UpdatePreview {
        poll_title: String,
        field: PollField,
        before: Vec<String>,
        after: Vec<String>,
        mode: Option<OptionEditMode>,
        defaulted_end_date: bool,
    },
    PollUpdated {
        poll_id: PollId,
        poll_title: String,
        field: PollField,
        after: Vec<String>,
    },
    PollList {
        listing: ListingKind,
        polls: Vec<PollSummary>,
    },
    PollDetails {
        poll: Poll,
    },
    VoteOptions {
        poll_title: String,
        options: Vec<String>,
    },
    VoteRecorded {
        poll_title: String,
        option: String,
    },
    Cancelled,
    Reset,
    Help,
    Greeting,
    Clarify,
}

/// State and session changes requested by a flow.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextUpdate {
    /// New state to store. Ignored when the flow ends.
    pub state: Option<ConversationState>,
    pub session_data: Map<String, Value>,
}

/// The contract between flows, the response generator and the context store.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResult {
    pub success: bool,
    /// Short lead text, e.g. why input was refused.
    pub message: Option<String>,
    pub data: Option<FlowData>,
    pub error: Option<FlowError>,
    pub next_step: Option<&'static str>,
    /// Clears the conversation state.
    pub should_end_flow: bool,
    pub context_update: Option<ContextUpdate>,
    pub render: RenderHint,
}

impl FlowResult {
    /// A successful turn that shows `data` and stays in the flow.
    pub fn reply(data: FlowData) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            next_step: None,
            should_end_flow: false,
            context_update: None,
            render: RenderHint::Verbatim,
        }
    }

    /// A successful terminal turn.
    pub fn finished(data: FlowData) -> Self {
        Self {
            should_end_flow: true,
            ..Self::reply(data)
        }
    }

    /// A refused turn. State is left as it was unless the caller says otherwise.
    pub fn failure(kind: FlowErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            success: false,
            message: Some(detail.clone()),
            data: None,
            error: Some(FlowError { kind, detail }),
            next_step: None,
            should_end_flow: false,
            context_update: None,
            render: RenderHint::Verbatim,
        }
    }

    /// Re-prompt for the current step with an explanation.
    pub fn reprompt(detail: impl Into<String>, data: FlowData) -> Self {
        Self::failure(FlowErrorKind::InvalidStateInput, detail).with_data(data)
    }

    pub fn with_data(mut self, data: FlowData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Stores `state` and records its step as the next step.
    pub fn with_state(mut self, state: ConversationState) -> Self {
        self.next_step = Some(state.step_name());
        self.context_update.get_or_insert_with(ContextUpdate::default).state = Some(state);
        self
    }

    pub fn with_session_value(mut self, key: &str, value: Value) -> Self {
        self.context_update
            .get_or_insert_with(ContextUpdate::default)
            .session_data
            .insert(key.to_string(), value);
        self
    }

    pub fn ending(mut self) -> Self {
        self.should_end_flow = true;
        self
    }

    pub fn naturalized(mut self) -> Self {
        self.render = RenderHint::Naturalize;
        self
    }

    pub fn conversational(mut self) -> Self {
        self.render = RenderHint::Converse;
        self
    }

    pub fn error_kind(&self) -> Option<&FlowErrorKind> {
        self.error.as_ref().map(|e| &e.kind)
    }
}
