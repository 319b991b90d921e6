//! Per-user conversation context and its durable snapshot form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::foundation::{PollId, Timestamp, UserId};

use super::intent::{EntityValue, Intent};
use super::message::ChatMessage;
use super::state::{ConversationState, StateKind};

/// Session key holding the ids of the polls shown by the last listing.
pub const LISTED_POLLS_KEY: &str = "listed_poll_ids";

const SECRET_MARKERS: [&str; 7] = [
    "password",
    "passwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "credential",
];

/// True for keys that must never be stored in session data or entities.
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SECRET_MARKERS.iter().any(|marker| key.contains(marker)) || key == "authorization"
}

/// Role resolved through the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

/// Everything the engine remembers about one user between turns.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationContext {
    pub user_id: UserId,
    pub role: UserRole,
    /// Recent window of the chat log, oldest first.
    pub history: Vec<ChatMessage>,
    pub current_state: Option<ConversationState>,
    pub session_data: Map<String, Value>,
    pub entities: BTreeMap<String, EntityValue>,
    pub last_intent: Option<Intent>,
    /// Incremented on every successful save.
    pub version: u64,
    pub updated_at: Timestamp,
}

impl ConversationContext {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self {
            user_id,
            role,
            history: Vec::new(),
            current_state: None,
            session_data: Map::new(),
            entities: BTreeMap::new(),
            last_intent: None,
            version: 0,
            updated_at: Timestamp::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn state_kind(&self) -> StateKind {
        self.current_state
            .as_ref()
            .map_or(StateKind::Idle, ConversationState::kind)
    }

    pub fn step_name(&self) -> &'static str {
        self.current_state
            .as_ref()
            .map_or("idle", ConversationState::step_name)
    }

    /// Appends to the recent window, dropping the oldest beyond `limit`.
    pub fn push_message(&mut self, message: ChatMessage, limit: usize) {
        self.history.push(message);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }

    /// Merges a patch into session data, dropping secret keys.
    ///
    /// A `null` value removes the key.
    pub fn merge_session_data(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if is_secret_key(&key) {
                continue;
            }
            if value.is_null() {
                self.session_data.remove(&key);
            } else {
                self.session_data.insert(key, value);
            }
        }
    }

    /// Records the intent of this turn and folds its entities in.
    pub fn remember_intent(&mut self, intent: &Intent) {
        for (key, value) in &intent.entities {
            if !is_secret_key(key) {
                self.entities.insert(key.clone(), value.clone());
            }
        }
        self.last_intent = Some(intent.clone());
    }

    /// Poll ids remembered from the last listing, in display order.
    pub fn listed_poll_ids(&self) -> Vec<PollId> {
        self.session_data
            .get(LISTED_POLLS_KEY)
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| s.parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            user_id: self.user_id.clone(),
            state: self
                .current_state
                .as_ref()
                .and_then(|s| serde_json::to_value(s).ok()),
            session_data: self.session_data.clone(),
            entities: self.entities.clone(),
            last_intent: self.last_intent.clone(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// Durable form of a context. History lives in the chat log.
///
/// The state is kept as raw JSON so an undecodable (older or corrupt)
/// state can be discarded without losing the rest of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub user_id: UserId,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub session_data: Map<String, Value>,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityValue>,
    #[serde(default)]
    pub last_intent: Option<Intent>,
    #[serde(default)]
    pub version: u64,
    pub updated_at: Timestamp,
}

impl ContextSnapshot {
    /// Decodes the state, returning `None` for anything that does not parse.
    pub fn decode_state(&self) -> Option<ConversationState> {
        self.state
            .clone()
            .and_then(|raw| serde_json::from_value(raw).ok())
    }
}
