//! Classified intent of a single user utterance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence at which a rule match is accepted without further checks.
pub const CONFIDENT: f32 = 0.8;

/// Confidence assigned to unclassified input.
pub const GENERAL_CONFIDENCE: f32 = 0.25;

/// Entity keys shared by the classifier and the flows.
pub mod keys {
    pub const NUMBER: &str = "number";
    pub const CATEGORY: &str = "category";
    pub const SUBJECT: &str = "subject";
    pub const FIELD: &str = "field";
    pub const OPTIONS: &str = "options";
    pub const MODE: &str = "mode";
    pub const REMEMBERED: &str = "remembered";
    pub const END_DATE: &str = "end_date";
    pub const DEFAULTED: &str = "defaulted";
    pub const COUNT: &str = "count";
    pub const KEYWORD: &str = "keyword";
    pub const POLL_REF: &str = "poll_ref";
}

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// cancel, stop, restart, reset...
    Reset,
    Help,
    Greeting,
    CreatePoll,
    UpdatePoll,
    Vote,
    ListPolls,
    ListMyPolls,
    ListRecentPolls,
    ListVotedPolls,
    Confirm,
    Decline,
    Edit,
    /// Bare number, optionally a list ("1, 3").
    NumericSelection,
    SelectField,
    RequestSuggestions,
    ModifyOptions,
    SetEndDate,
    /// Free text for the active step.
    ProvideInput,
    General,
}

impl IntentType {
    /// Intents that drop any active flow before being handled.
    pub fn clears_state(&self) -> bool {
        matches!(self, IntentType::Reset | IntentType::Help)
    }

    /// Intents that begin a top-level task.
    pub fn is_flow_entry(&self) -> bool {
        matches!(
            self,
            IntentType::CreatePoll
                | IntentType::UpdatePoll
                | IntentType::Vote
                | IntentType::ListPolls
                | IntentType::ListMyPolls
                | IntentType::ListRecentPolls
                | IntentType::ListVotedPolls
        )
    }

    pub fn is_listing(&self) -> bool {
        matches!(
            self,
            IntentType::ListPolls
                | IntentType::ListMyPolls
                | IntentType::ListRecentPolls
                | IntentType::ListVotedPolls
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Reset => "reset",
            IntentType::Help => "help",
            IntentType::Greeting => "greeting",
            IntentType::CreatePoll => "create_poll",
            IntentType::UpdatePoll => "update_poll",
            IntentType::Vote => "vote",
            IntentType::ListPolls => "list_polls",
            IntentType::ListMyPolls => "list_my_polls",
            IntentType::ListRecentPolls => "list_recent_polls",
            IntentType::ListVotedPolls => "list_voted_polls",
            IntentType::Confirm => "confirm",
            IntentType::Decline => "decline",
            IntentType::Edit => "edit",
            IntentType::NumericSelection => "numeric_selection",
            IntentType::SelectField => "select_field",
            IntentType::RequestSuggestions => "request_suggestions",
            IntentType::ModifyOptions => "modify_options",
            IntentType::SetEndDate => "set_end_date",
            IntentType::ProvideInput => "provide_input",
            IntentType::General => "general",
        }
    }

    /// Labels the backend may answer with when asked to classify.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches(['"', '.', '\'']).to_lowercase();
        let kind = match label.as_str() {
            "create_poll" => IntentType::CreatePoll,
            "update_poll" => IntentType::UpdatePoll,
            "vote" => IntentType::Vote,
            "list_polls" => IntentType::ListPolls,
            "list_my_polls" => IntentType::ListMyPolls,
            "list_recent_polls" => IntentType::ListRecentPolls,
            "list_voted_polls" => IntentType::ListVotedPolls,
            "greeting" => IntentType::Greeting,
            "help" => IntentType::Help,
            "general" => IntentType::General,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed entity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    Text(String),
    Number(i64),
    List(Vec<String>),
    Flag(bool),
}

/// Option edit mode extracted from an update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionEditMode {
    Add,
    Replace,
    /// Negated or conflicting wording; ask again.
    Clarify,
}

impl OptionEditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionEditMode::Add => "add",
            OptionEditMode::Replace => "replace",
            OptionEditMode::Clarify => "clarify",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(OptionEditMode::Add),
            "replace" => Some(OptionEditMode::Replace),
            "clarify" => Some(OptionEditMode::Clarify),
            _ => None,
        }
    }
}

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentType,
    /// 0.0 to 1.0
    pub confidence: f32,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityValue>,
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Intent {
    pub fn new(kind: IntentType, confidence: f32, raw_text: impl Into<String>) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            entities: BTreeMap::new(),
            raw_text: raw_text.into(),
            notes: None,
        }
    }

    /// Low-confidence catch-all.
    pub fn general(raw_text: impl Into<String>) -> Self {
        Self::new(IntentType::General, GENERAL_CONFIDENCE, raw_text)
    }

    pub fn with_entity(mut self, key: &str, value: EntityValue) -> Self {
        self.entities.insert(key.to_string(), value);
        self
    }

    pub fn with_text(self, key: &str, value: impl Into<String>) -> Self {
        self.with_entity(key, EntityValue::Text(value.into()))
    }

    pub fn with_number(self, key: &str, value: i64) -> Self {
        self.with_entity(key, EntityValue::Number(value))
    }

    pub fn with_list(self, key: &str, value: Vec<String>) -> Self {
        self.with_entity(key, EntityValue::List(value))
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_confident(&self) -> bool {
        self.confidence >= CONFIDENT
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entities.get(key) {
            Some(EntityValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        match self.entities.get(key) {
            Some(EntityValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.entities.get(key) {
            Some(EntityValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.entities.get(key), Some(EntityValue::Flag(true)))
    }

    pub fn option_mode(&self) -> Option<OptionEditMode> {
        self.text(keys::MODE).and_then(OptionEditMode::parse)
    }

    pub fn remembered_mode(&self) -> Option<OptionEditMode> {
        self.text(keys::REMEMBERED).and_then(OptionEditMode::parse)
    }
}
