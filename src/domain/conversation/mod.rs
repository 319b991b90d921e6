//! Conversation domain module.
//!
//! Messages, intents, per-user flow state and the uniform flow result,
//! plus the deterministic templates results are rendered with.

mod context;
mod flow_result;
mod intent;
mod message;
mod state;
pub mod templates;

pub use context::{is_secret_key, ContextSnapshot, ConversationContext, UserRole, LISTED_POLLS_KEY};
pub use flow_result::{
    ContextUpdate, FlowData, FlowError, FlowErrorKind, FlowResult, ListingKind, MenuPurpose,
    RenderHint,
};
pub use intent::{
    keys, EntityValue, Intent, IntentType, OptionEditMode, CONFIDENT, GENERAL_CONFIDENCE,
};
pub use message::{ChatMessage, ChatRole};
pub use state::{
    ConversationState, CreationDraft, CreationState, CreationStep, FlowState, StateKind,
    UpdateDraft, UpdateState, UpdateStep, VotingDraft, VotingState, VotingStep,
};
