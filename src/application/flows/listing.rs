//! Poll listings and details for a listed poll.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::conversation::{
    keys, ConversationContext, FlowData, FlowErrorKind, FlowResult, Intent, IntentType,
    ListingKind, LISTED_POLLS_KEY,
};
use crate::domain::poll::Poll;

use super::{forbidden, pick, storage_failure, FlowController, FlowServices};

/// Shown when no explicit count was given.
pub const DEFAULT_RECENT: usize = 5;

/// Upper bound for every listing.
pub const MAX_LISTED: usize = 20;

pub struct PollListingFlow {
    services: FlowServices,
}

#[async_trait]
impl FlowController for PollListingFlow {
    async fn handle_intent(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        let user = &context.user_id;
        let (listing, fetched) = match intent.kind {
            IntentType::ListPolls => (
                ListingKind::Active,
                self.services.polls.fetch_active_polls(MAX_LISTED).await,
            ),
            IntentType::ListMyPolls => {
                if !context.is_admin() {
                    return forbidden();
                }
                (ListingKind::Mine, self.services.polls.fetch_polls_by_owner(user).await)
            }
            IntentType::ListRecentPolls => {
                let limit = recent_limit(intent.number(keys::COUNT));
                (
                    ListingKind::Recent { limit },
                    self.services.polls.fetch_recent_polls(limit).await,
                )
            }
            IntentType::ListVotedPolls => (
                ListingKind::Voted,
                self.services.polls.fetch_polls_voted_by(user).await,
            ),
            IntentType::NumericSelection => return self.details(intent, context).await,
            _ => {
                return FlowResult::failure(
                    FlowErrorKind::ClassificationMiss,
                    "I can list active polls, your polls, recent polls or polls you voted on.",
                )
                .with_data(FlowData::Help)
            }
        };

        let polls = match fetched {
            Ok(polls) => polls,
            Err(e) => return storage_failure("list_polls", e).ending(),
        };
        let summaries: Vec<_> = polls.iter().take(MAX_LISTED).map(Poll::summary).collect();
        let ids: Vec<Value> = summaries
            .iter()
            .map(|p| Value::String(p.id.to_string()))
            .collect();

        info!(user_id = %user, listing = ?listing, count = summaries.len(), "Polls listed");
        FlowResult::finished(FlowData::PollList {
            listing,
            polls: summaries,
        })
        .with_session_value(LISTED_POLLS_KEY, Value::Array(ids))
        .naturalized()
    }
}

impl PollListingFlow {
    pub fn new(services: FlowServices) -> Self {
        Self { services }
    }

    /// Details for the n-th poll of the last listing.
    async fn details(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        let listed = context.listed_poll_ids();
        let Some(&poll_id) = pick(&listed, intent.number(keys::NUMBER)) else {
            return FlowResult::failure(
                FlowErrorKind::NotFound,
                format!(
                    "There's no poll with that number. Pick one between 1 and {}.",
                    listed.len().max(1)
                ),
            );
        };

        // Owners may look at their own polls even after they close.
        let owned = match self
            .services
            .polls
            .fetch_poll_by_id_and_owner(poll_id, &context.user_id)
            .await
        {
            Ok(poll) => poll,
            Err(e) => return storage_failure("fetch_poll_by_id_and_owner", e),
        };
        let poll = match owned {
            Some(poll) => Some(poll),
            None => match self.services.polls.fetch_active_poll(poll_id).await {
                Ok(poll) => poll,
                Err(e) => return storage_failure("fetch_active_poll", e),
            },
        };

        match poll {
            Some(poll) => {
                debug!(user_id = %context.user_id, poll_id = %poll.id, "Poll details shown");
                FlowResult::finished(FlowData::PollDetails { poll })
            }
            None => FlowResult::failure(
                FlowErrorKind::NotFound,
                "That poll is no longer available.",
            )
            .ending(),
        }
    }
}

fn recent_limit(requested: Option<i64>) -> usize {
    requested
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(DEFAULT_RECENT)
        .clamp(1, MAX_LISTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPollRepository;
    use crate::domain::conversation::UserRole;
    use crate::domain::foundation::{PollId, UserId};
    use std::sync::Arc;

    fn flow(polls: &InMemoryPollRepository) -> PollListingFlow {
        PollListingFlow::new(FlowServices::new(Arc::new(polls.clone()), None))
    }

    fn context(role: UserRole) -> ConversationContext {
        ConversationContext::new(UserId::new("viewer").unwrap(), role)
    }

    fn listed(result: &FlowResult) -> Vec<PollId> {
        let mut ctx = context(UserRole::User);
        ctx.merge_session_data(result.context_update.clone().unwrap().session_data);
        ctx.listed_poll_ids()
    }

    #[tokio::test]
    async fn active_listing_remembers_ids_in_order() {
        let polls = InMemoryPollRepository::new();
        let owner = UserId::new("owner").unwrap();
        let first = polls.seed_poll(&owner, "First poll", &["A", "B"]).await;
        let second = polls.seed_poll(&owner, "Second poll", &["A", "B"]).await;

        let intent = Intent::new(IntentType::ListPolls, 0.9, "show polls");
        let result = flow(&polls).handle_intent(&intent, &context(UserRole::User)).await;

        assert!(result.should_end_flow);
        assert_eq!(listed(&result), vec![second.id, first.id]);
    }

    #[test]
    fn recent_count_is_clamped() {
        assert_eq!(recent_limit(None), DEFAULT_RECENT);
        assert_eq!(recent_limit(Some(0)), 1);
        assert_eq!(recent_limit(Some(500)), MAX_LISTED);
        assert_eq!(recent_limit(Some(-3)), DEFAULT_RECENT);
    }

    #[tokio::test]
    async fn my_polls_requires_admin() {
        let polls = InMemoryPollRepository::new();
        let intent = Intent::new(IntentType::ListMyPolls, 0.9, "my polls");
        let result = flow(&polls).handle_intent(&intent, &context(UserRole::User)).await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn number_after_listing_shows_details() {
        let polls = InMemoryPollRepository::new();
        let owner = UserId::new("owner").unwrap();
        polls.seed_poll(&owner, "Older poll", &["A", "B"]).await;
        let newest = polls.seed_poll(&owner, "Newest poll", &["C", "D"]).await;
        let listing = flow(&polls);

        let mut ctx = context(UserRole::User);
        let result = listing
            .handle_intent(&Intent::new(IntentType::ListPolls, 0.9, "show polls"), &ctx)
            .await;
        ctx.merge_session_data(result.context_update.unwrap().session_data);

        let pick_first = Intent::new(IntentType::NumericSelection, 0.9, "1").with_number(keys::NUMBER, 1);
        let result = listing.handle_intent(&pick_first, &ctx).await;
        match result.data {
            Some(FlowData::PollDetails { poll }) => assert_eq!(poll.id, newest.id),
            other => panic!("expected details, got {:?}", other),
        }

        let out_of_range = Intent::new(IntentType::NumericSelection, 0.9, "9").with_number(keys::NUMBER, 9);
        let result = listing.handle_intent(&out_of_range, &ctx).await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::NotFound));
    }
}
