//! Per-user flow state.
//!
//! A user is either idle (no state) or inside exactly one flow. Each flow
//! carries its own step enum and typed draft, so a step can never belong to
//! a different flow than the one that is active.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PollId, StateMachine, Timestamp};
use crate::domain::poll::{Category, PollChange, PollSummary};

use super::intent::OptionEditMode;

/// Poll creation steps: `category -> topic -> options -> confirm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CreationStep {
    #[default]
    Category,
    Topic,
    Options,
    Confirm,
}

impl CreationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationStep::Category => "category",
            CreationStep::Topic => "topic",
            CreationStep::Options => "options",
            CreationStep::Confirm => "confirm",
        }
    }
}

impl StateMachine for CreationStep {
    fn can_transition_to(&self, target: &Self) -> bool {
        use CreationStep::*;
        matches!(
            (self, target),
            (Category, Topic) |
            (Topic, Options) |
            (Options, Confirm) |
            // Edit at confirmation starts over
            (Confirm, Category)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use CreationStep::*;
        match self {
            Category => vec![Topic],
            Topic => vec![Options],
            Options => vec![Confirm],
            Confirm => vec![Category],
        }
    }
}

/// Poll update steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStep {
    #[default]
    SelectPoll,
    SelectField,
    UpdateTitle,
    UpdateOptions,
    UpdateCategory,
    UpdateEndDate,
    ConfirmUpdate,
}

impl UpdateStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStep::SelectPoll => "select_poll",
            UpdateStep::SelectField => "select_field",
            UpdateStep::UpdateTitle => "update_title",
            UpdateStep::UpdateOptions => "update_options",
            UpdateStep::UpdateCategory => "update_category",
            UpdateStep::UpdateEndDate => "update_end_date",
            UpdateStep::ConfirmUpdate => "confirm_update",
        }
    }

    pub fn is_field_step(&self) -> bool {
        matches!(
            self,
            UpdateStep::UpdateTitle
                | UpdateStep::UpdateOptions
                | UpdateStep::UpdateCategory
                | UpdateStep::UpdateEndDate
        )
    }
}

impl StateMachine for UpdateStep {
    fn can_transition_to(&self, target: &Self) -> bool {
        use UpdateStep::*;
        match (self, target) {
            (SelectPoll, SelectField) => true,
            (SelectField, t) => t.is_field_step(),
            (s, ConfirmUpdate) => s.is_field_step(),
            (ConfirmUpdate, SelectField) => true,
            _ => false,
        }
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use UpdateStep::*;
        match self {
            SelectPoll => vec![SelectField],
            SelectField => vec![UpdateTitle, UpdateOptions, UpdateCategory, UpdateEndDate],
            UpdateTitle | UpdateOptions | UpdateCategory | UpdateEndDate => vec![ConfirmUpdate],
            ConfirmUpdate => vec![SelectField],
        }
    }
}

/// Voting steps: `select_poll -> select_option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VotingStep {
    #[default]
    SelectPoll,
    SelectOption,
}

impl VotingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingStep::SelectPoll => "select_poll",
            VotingStep::SelectOption => "select_option",
        }
    }
}

impl StateMachine for VotingStep {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (VotingStep::SelectPoll, VotingStep::SelectOption))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            VotingStep::SelectPoll => vec![VotingStep::SelectOption],
            VotingStep::SelectOption => vec![],
        }
    }
}

/// Slots collected while creating a poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreationDraft {
    pub category: Option<Category>,
    pub topic: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub suggested_topics: Vec<String>,
    #[serde(default)]
    pub suggested_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreationState {
    pub step: CreationStep,
    #[serde(default)]
    pub draft: CreationDraft,
}

/// Slots collected while editing a poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateDraft {
    /// Polls shown in the selection menu, in display order.
    #[serde(default)]
    pub candidates: Vec<PollSummary>,
    pub poll_id: Option<PollId>,
    pub poll_title: Option<String>,
    #[serde(default)]
    pub current_options: Vec<String>,
    pub current_category: Option<Category>,
    pub current_end_date: Option<Timestamp>,
    /// Mode remembered from an earlier option-edit turn.
    pub option_mode: Option<OptionEditMode>,
    /// Buffered change shown in the preview.
    pub pending: Option<PollChange>,
    /// Mode the pending option change was built with.
    pub pending_mode: Option<OptionEditMode>,
    /// The pending end date was filled in with the default extension.
    #[serde(default)]
    pub defaulted_end_date: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateState {
    pub step: UpdateStep,
    #[serde(default)]
    pub draft: UpdateDraft,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VotingDraft {
    #[serde(default)]
    pub candidates: Vec<PollSummary>,
    pub poll_id: Option<PollId>,
    pub poll_title: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VotingState {
    pub step: VotingStep,
    #[serde(default)]
    pub draft: VotingDraft,
}

/// The active flow and its step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowState {
    PollCreation(CreationState),
    PollUpdate(UpdateState),
    Voting(VotingState),
}

impl FlowState {
    pub fn kind(&self) -> StateKind {
        match self {
            FlowState::PollCreation(_) => StateKind::PollCreation,
            FlowState::PollUpdate(_) => StateKind::PollUpdate,
            FlowState::Voting(_) => StateKind::Voting,
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            FlowState::PollCreation(s) => s.step.as_str(),
            FlowState::PollUpdate(s) => s.step.as_str(),
            FlowState::Voting(s) => s.step.as_str(),
        }
    }

    /// Steps whose answer is open text (a question, a title, option names).
    pub fn expects_free_text(&self) -> bool {
        match self {
            FlowState::PollCreation(s) => {
                matches!(s.step, CreationStep::Topic | CreationStep::Options)
            }
            FlowState::PollUpdate(s) => {
                matches!(s.step, UpdateStep::UpdateTitle | UpdateStep::UpdateOptions)
            }
            FlowState::Voting(s) => s.step == VotingStep::SelectOption,
        }
    }
}

/// Flow tag including the idle case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Idle,
    PollCreation,
    PollUpdate,
    Voting,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::PollCreation => "poll_creation",
            StateKind::PollUpdate => "poll_update",
            StateKind::Voting => "voting",
        }
    }
}

/// A flow in progress for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub flow: FlowState,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl ConversationState {
    pub fn new(flow: FlowState) -> Self {
        let now = Timestamp::now();
        Self {
            flow,
            started_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    pub fn creation(state: CreationState) -> Self {
        Self::new(FlowState::PollCreation(state))
    }

    pub fn update(state: UpdateState) -> Self {
        Self::new(FlowState::PollUpdate(state))
    }

    pub fn voting(state: VotingState) -> Self {
        Self::new(FlowState::Voting(state))
    }

    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Replaces the flow, keeping `started_at` and bumping `updated_at`.
    pub fn advance(&self, flow: FlowState) -> Self {
        Self {
            flow,
            started_at: self.started_at,
            updated_at: Timestamp::now(),
            expires_at: self.expires_at,
        }
    }

    pub fn kind(&self) -> StateKind {
        self.flow.kind()
    }

    pub fn step_name(&self) -> &'static str {
        self.flow.step_name()
    }

    /// Past its explicit expiry or untouched for longer than `ttl_hours`.
    pub fn is_stale(&self, now: &Timestamp, ttl_hours: i64) -> bool {
        if let Some(expires_at) = &self.expires_at {
            if !expires_at.is_after(now) {
                return true;
            }
        }
        self.updated_at.is_before(&now.minus_hours(ttl_hours))
    }
}
