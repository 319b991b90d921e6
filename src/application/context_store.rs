//! Conversation Context Store
//!
//! Per-process cache of [`ConversationContext`] over a durable
//! [`ContextSnapshotStore`]. A cache miss rebuilds the context from the
//! snapshot, the user's role and the recent chat log. Stale flow states are
//! dropped on load. Saves are version-checked and turns for one user are
//! sequenced with [`ContextStore::lock_user`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::domain::conversation::{
    is_secret_key, ChatMessage, ConversationContext, ConversationState, UserRole,
};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{ChatHistoryRepository, ContextSnapshotStore, RoleProvider, SnapshotError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextStoreError {
    #[error("context for {user} changed concurrently (expected version {expected}, found {found})")]
    Conflict {
        user: String,
        expected: u64,
        found: u64,
    },

    #[error("snapshot store error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Cache sizing and hygiene settings.
#[derive(Debug, Clone, Copy)]
pub struct ContextStoreConfig {
    pub state_ttl_hours: i64,
    pub history_limit: usize,
}

impl Default for ContextStoreConfig {
    fn default() -> Self {
        Self {
            state_ttl_hours: 24,
            history_limit: 20,
        }
    }
}

pub struct ContextStore {
    snapshots: Arc<dyn ContextSnapshotStore>,
    roles: Arc<dyn RoleProvider>,
    history: Arc<dyn ChatHistoryRepository>,
    config: ContextStoreConfig,
    cache: RwLock<HashMap<UserId, ConversationContext>>,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl ContextStore {
    pub fn new(
        snapshots: Arc<dyn ContextSnapshotStore>,
        roles: Arc<dyn RoleProvider>,
        history: Arc<dyn ChatHistoryRepository>,
        config: ContextStoreConfig,
    ) -> Self {
        Self {
            snapshots,
            roles,
            history,
            config,
            cache: RwLock::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> ContextStoreConfig {
        self.config
    }

    /// Serializes turns for one user. Hold the guard for the whole turn.
    pub async fn lock_user(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            Arc::clone(locks.entry(user.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Returns the user's context, building it on a cache miss.
    pub async fn load(&self, user: &UserId) -> Result<ConversationContext, ContextStoreError> {
        let cached = self.cache.read().await.get(user).cloned();
        let mut context = match cached {
            Some(context) => context,
            None => self.rebuild(user).await?,
        };

        let now = Timestamp::now();
        let stale = context
            .current_state
            .as_ref()
            .is_some_and(|state| state.is_stale(&now, self.config.state_ttl_hours));
        if stale {
            info!(
                user_id = %user,
                step = context.step_name(),
                "Discarding stale conversation state"
            );
            context.current_state = None;
        }

        self.cache.write().await.insert(user.clone(), context.clone());
        Ok(context)
    }

    async fn rebuild(&self, user: &UserId) -> Result<ConversationContext, ContextStoreError> {
        let role = match self.roles.get_user_role(user).await {
            Ok(role) => role,
            Err(e) => {
                warn!(user_id = %user, error = %e, "Role lookup failed, using default role");
                UserRole::default()
            }
        };

        let mut context = ConversationContext::new(user.clone(), role);
        match self
            .history
            .fetch_recent_chat_messages(user, self.config.history_limit)
            .await
        {
            Ok(messages) => context.history = messages,
            Err(e) => warn!(user_id = %user, error = %e, "Chat history unavailable"),
        }

        if let Some(snapshot) = self.snapshots.load_context_snapshot(user).await? {
            let state = snapshot.decode_state();
            if snapshot.state.is_some() && state.is_none() {
                warn!(user_id = %user, "Dropping undecodable conversation state");
            }
            context.current_state = state;
            context.session_data = snapshot.session_data;
            context.entities = snapshot.entities;
            context.last_intent = snapshot.last_intent;
            context.version = snapshot.version;
            context.updated_at = snapshot.updated_at;
        }

        debug!(user_id = %user, version = context.version, "Context rebuilt");
        Ok(context)
    }

    /// Persists `context` if nobody saved since it was loaded, then bumps
    /// its version.
    pub async fn save(&self, context: &mut ConversationContext) -> Result<(), ContextStoreError> {
        let mut cache = self.cache.write().await;
        let found = match cache.get(&context.user_id) {
            Some(current) => current.version,
            None => self
                .snapshots
                .load_context_snapshot(&context.user_id)
                .await?
                .map_or(0, |s| s.version),
        };
        if found != context.version {
            return Err(ContextStoreError::Conflict {
                user: context.user_id.to_string(),
                expected: context.version,
                found,
            });
        }

        context.session_data.retain(|key, _| !is_secret_key(key));
        context.entities.retain(|key, _| !is_secret_key(key));
        context.version += 1;
        context.updated_at = Timestamp::now();

        if let Err(e) = self.snapshots.upsert_context_snapshot(&context.to_snapshot()).await {
            context.version -= 1;
            return Err(e.into());
        }
        cache.insert(context.user_id.clone(), context.clone());
        Ok(())
    }

    /// Sets or clears the flow state. Clearing an idle user is a no-op.
    pub async fn set_state(
        &self,
        user: &UserId,
        state: Option<ConversationState>,
    ) -> Result<(), ContextStoreError> {
        let mut context = self.load(user).await?;
        if state.is_none() && context.current_state.is_none() {
            return Ok(());
        }
        context.current_state = state;
        self.save(&mut context).await
    }

    /// Merges `patch` into session data; `null` removes a key and secret
    /// keys are dropped.
    pub async fn update_session_data(
        &self,
        user: &UserId,
        patch: Map<String, Value>,
    ) -> Result<(), ContextStoreError> {
        let mut context = self.load(user).await?;
        context.merge_session_data(patch);
        self.save(&mut context).await
    }

    /// Forgets everything but the chat log. Idempotent.
    pub async fn clear(&self, user: &UserId) -> Result<(), ContextStoreError> {
        self.cache.write().await.remove(user);
        self.snapshots.delete_context_snapshot(user).await?;
        debug!(user_id = %user, "Context cleared");
        Ok(())
    }

    /// Appends to the durable chat log and the in-context window.
    pub async fn record_message(&self, context: &mut ConversationContext, message: ChatMessage) {
        if let Err(e) = self.history.append_chat_message(&context.user_id, &message).await {
            warn!(user_id = %context.user_id, error = %e, "Failed to append chat message");
        }
        context.push_message(message, self.config.history_limit);
    }

    /// Drops cached contexts untouched for longer than the state TTL.
    /// They are rebuilt from their snapshot on next use.
    pub async fn evict_idle(&self) -> usize {
        let cutoff = Timestamp::now().minus_hours(self.config.state_ttl_hours);
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, context| !context.updated_at.is_before(&cutoff));
        let evicted = before - cache.len();

        // A lock still held or awaited has a second strong reference.
        let mut locks = self.user_locks.lock().await;
        locks.retain(|user, lock| cache.contains_key(user) || Arc::strong_count(lock) > 1);
        let tracked_locks = locks.len();
        drop(locks);
        drop(cache);

        if evicted > 0 {
            info!(evicted, tracked_locks, "Evicted idle conversation contexts");
        }
        evicted
    }

    pub async fn cached_users(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn tracked_locks(&self) -> usize {
        self.user_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryChatHistory, InMemorySnapshotStore, StaticRoleProvider};
    use crate::domain::conversation::{CreationState, CreationStep};
    use serde_json::json;

    struct Fixture {
        store: ContextStore,
        snapshots: InMemorySnapshotStore,
        history: InMemoryChatHistory,
    }

    fn fixture() -> Fixture {
        let snapshots = InMemorySnapshotStore::new();
        let history = InMemoryChatHistory::new();
        let roles = StaticRoleProvider::new(UserRole::User).with_admin(admin());
        let store = ContextStore::new(
            Arc::new(snapshots.clone()),
            Arc::new(roles),
            Arc::new(history.clone()),
            ContextStoreConfig::default(),
        );
        Fixture {
            store,
            snapshots,
            history,
        }
    }

    fn admin() -> UserId {
        UserId::new("admin-1").unwrap()
    }

    fn creation_at(step: CreationStep) -> ConversationState {
        ConversationState::creation(CreationState {
            step,
            ..CreationState::default()
        })
    }

    #[tokio::test]
    async fn miss_merges_role_and_history() {
        let f = fixture();
        f.history
            .append_chat_message(&admin(), &ChatMessage::user("hello").unwrap())
            .await
            .unwrap();

        let context = f.store.load(&admin()).await.unwrap();
        assert!(context.is_admin());
        assert_eq!(context.history.len(), 1);
        assert!(context.current_state.is_none());
    }

    #[tokio::test]
    async fn state_survives_a_cold_cache() {
        let f = fixture();
        f.store
            .set_state(&admin(), Some(creation_at(CreationStep::Topic)))
            .await
            .unwrap();

        let cold = ContextStore::new(
            Arc::new(f.snapshots.clone()),
            Arc::new(StaticRoleProvider::new(UserRole::User)),
            Arc::new(f.history.clone()),
            ContextStoreConfig::default(),
        );
        let context = cold.load(&admin()).await.unwrap();
        assert_eq!(context.step_name(), "topic");
        assert_eq!(context.version, 1);
    }

    #[tokio::test]
    async fn stale_state_is_discarded_on_load() {
        let f = fixture();
        let mut state = creation_at(CreationStep::Options);
        state.updated_at = Timestamp::now().minus_hours(25);
        f.store.set_state(&admin(), Some(state)).await.unwrap();

        let context = f.store.load(&admin()).await.unwrap();
        assert!(context.current_state.is_none());
    }

    #[tokio::test]
    async fn expired_state_is_discarded_on_load() {
        let f = fixture();
        let state = creation_at(CreationStep::Options).with_expiry(Timestamp::now().minus_hours(1));
        f.store.set_state(&admin(), Some(state)).await.unwrap();

        assert!(f.store.load(&admin()).await.unwrap().current_state.is_none());
    }

    #[tokio::test]
    async fn undecodable_state_is_dropped_but_session_data_kept() {
        let f = fixture();
        let mut snapshot = ConversationContext::new(admin(), UserRole::Admin).to_snapshot();
        snapshot.state = Some(json!({"flow": {"type": "poll_creation", "step": "warp"}}));
        snapshot.session_data.insert("listed_poll_ids".into(), json!([]));
        snapshot.version = 4;
        f.snapshots.upsert_context_snapshot(&snapshot).await.unwrap();

        let context = f.store.load(&admin()).await.unwrap();
        assert!(context.current_state.is_none());
        assert!(context.session_data.contains_key("listed_poll_ids"));
        assert_eq!(context.version, 4);
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let f = fixture();
        let mut first = f.store.load(&admin()).await.unwrap();
        let mut second = first.clone();

        f.store.save(&mut first).await.unwrap();
        assert_eq!(first.version, 1);

        let err = f.store.save(&mut second).await.unwrap_err();
        assert_eq!(
            err,
            ContextStoreError::Conflict {
                user: admin().to_string(),
                expected: 0,
                found: 1
            }
        );
    }

    #[tokio::test]
    async fn clearing_idle_state_is_a_no_op() {
        let f = fixture();
        f.store.set_state(&admin(), None).await.unwrap();
        f.store.set_state(&admin(), None).await.unwrap();
        assert_eq!(f.store.load(&admin()).await.unwrap().version, 0);
        assert_eq!(f.snapshots.snapshot_count().await, 0);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let f = fixture();
        f.store
            .set_state(&admin(), Some(creation_at(CreationStep::Topic)))
            .await
            .unwrap();
        f.store.clear(&admin()).await.unwrap();
        f.store.clear(&admin()).await.unwrap();

        assert_eq!(f.snapshots.snapshot_count().await, 0);
        assert!(f.store.load(&admin()).await.unwrap().current_state.is_none());
    }

    #[tokio::test]
    async fn session_patch_drops_secrets() {
        let f = fixture();
        let patch = json!({"api_key": "sk-123", "colour": "green"});
        f.store
            .update_session_data(&admin(), patch.as_object().cloned().unwrap())
            .await
            .unwrap();

        let context = f.store.load(&admin()).await.unwrap();
        assert_eq!(context.session_data.len(), 1);
        assert_eq!(context.session_data["colour"], "green");
    }

    #[tokio::test]
    async fn save_filters_secrets_set_directly() {
        let f = fixture();
        let mut context = f.store.load(&admin()).await.unwrap();
        context.session_data.insert("session_token".into(), json!("t"));
        f.store.save(&mut context).await.unwrap();

        let stored = f.snapshots.load_context_snapshot(&admin()).await.unwrap().unwrap();
        assert!(stored.session_data.is_empty());
    }

    #[tokio::test]
    async fn record_message_bounds_the_window() {
        let snapshots = InMemorySnapshotStore::new();
        let history = InMemoryChatHistory::new();
        let store = ContextStore::new(
            Arc::new(snapshots),
            Arc::new(StaticRoleProvider::new(UserRole::User)),
            Arc::new(history.clone()),
            ContextStoreConfig {
                history_limit: 2,
                ..ContextStoreConfig::default()
            },
        );
        let mut context = store.load(&admin()).await.unwrap();
        for text in ["one", "two", "three"] {
            store
                .record_message(&mut context, ChatMessage::user(text).unwrap())
                .await;
        }
        assert_eq!(context.history.len(), 2);
        assert_eq!(history.messages(&admin()).await.len(), 3);
    }

    #[tokio::test]
    async fn idle_contexts_are_evicted_from_cache() {
        let f = fixture();
        let mut context = f.store.load(&admin()).await.unwrap();
        f.store.save(&mut context).await.unwrap();
        assert_eq!(f.store.evict_idle().await, 0);

        f.store.cache.write().await.get_mut(&admin()).unwrap().updated_at =
            Timestamp::now().minus_hours(48);
        assert_eq!(f.store.evict_idle().await, 1);
        assert_eq!(f.store.cached_users().await, 0);
    }

    #[tokio::test]
    async fn eviction_releases_idle_user_locks() {
        let f = fixture();
        let busy = UserId::new("busy").unwrap();
        for user in [admin(), busy.clone()] {
            drop(f.store.lock_user(&user).await);
            let mut context = f.store.load(&user).await.unwrap();
            f.store.save(&mut context).await.unwrap();
        }
        assert_eq!(f.store.tracked_locks().await, 2);

        {
            let mut cache = f.store.cache.write().await;
            for context in cache.values_mut() {
                context.updated_at = Timestamp::now().minus_hours(48);
            }
        }
        let held = f.store.lock_user(&busy).await;

        assert_eq!(f.store.evict_idle().await, 2);
        assert_eq!(f.store.tracked_locks().await, 1);

        drop(held);
        f.store.evict_idle().await;
        assert_eq!(f.store.tracked_locks().await, 0);
    }

    #[test]
    fn snapshot_failures_compare_by_value() {
        let err = ContextStoreError::from(SnapshotError::IoError("disk full".into()));
        assert_eq!(err.clone(), err);
        assert_ne!(err, ContextStoreError::from(SnapshotError::IoError("other".into())));
    }

    #[tokio::test]
    async fn user_lock_sequences_turns() {
        let f = Arc::new(fixture());
        let guard = f.store.lock_user(&admin()).await;

        let contender = {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                let _guard = f.store.lock_user(&admin()).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}
