//! Voting: `select_poll -> select_option`.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::conversation::{
    keys, ConversationContext, ConversationState, FlowData, FlowErrorKind, FlowResult, FlowState,
    Intent, IntentType, MenuPurpose, VotingDraft, VotingState, VotingStep,
};
use crate::domain::foundation::PollId;
use crate::domain::poll::{Poll, PollOption};
use crate::ports::RepositoryError;

use super::listing::MAX_LISTED;
use super::{match_title, pick, storage_failure, FlowController, FlowServices};

pub struct VotingFlow {
    services: FlowServices,
}

#[async_trait]
impl FlowController for VotingFlow {
    async fn handle_intent(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        let current = context.current_state.as_ref().and_then(|state| match &state.flow {
            FlowState::Voting(voting) => Some((state, voting)),
            _ => None,
        });

        match current {
            None => self.start(intent, context).await,
            Some((state, voting)) => {
                debug!(user_id = %context.user_id, step = voting.step.as_str(), "Voting step");
                match voting.step {
                    VotingStep::SelectPoll => self.select_poll(intent, state, &voting.draft).await,
                    VotingStep::SelectOption => {
                        self.select_option(intent, context, &voting.draft).await
                    }
                }
            }
        }
    }
}

impl VotingFlow {
    pub fn new(services: FlowServices) -> Self {
        Self { services }
    }

    async fn start(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        let polls = match self.services.polls.fetch_active_polls(MAX_LISTED).await {
            Ok(polls) => polls,
            Err(e) => return storage_failure("fetch_active_polls", e).ending(),
        };
        if polls.is_empty() {
            return FlowResult::failure(
                FlowErrorKind::NotFound,
                "There are no open polls to vote on right now.",
            )
            .ending();
        }

        let draft = VotingDraft {
            candidates: polls.iter().map(Poll::summary).collect(),
            ..VotingDraft::default()
        };

        // "vote on <poll id>" skips the menu.
        if let Some(poll) = intent
            .text(keys::POLL_REF)
            .and_then(|r| r.parse::<PollId>().ok())
            .and_then(|id| polls.iter().find(|p| p.id == id))
        {
            let state = ConversationState::voting(VotingState::default());
            return options_for(&state, draft, poll.clone());
        }

        info!(user_id = %context.user_id, polls = draft.candidates.len(), "Voting started");
        let data = FlowData::PollMenu {
            purpose: MenuPurpose::Vote,
            polls: draft.candidates.clone(),
        };
        FlowResult::reply(data).with_state(ConversationState::voting(VotingState {
            step: VotingStep::SelectPoll,
            draft,
        }))
    }

    async fn select_poll(
        &self,
        intent: &Intent,
        state: &ConversationState,
        draft: &VotingDraft,
    ) -> FlowResult {
        let chosen = match intent.kind {
            IntentType::NumericSelection => pick(&draft.candidates, intent.number(keys::NUMBER)).map(|p| p.id),
            _ => intent
                .text(keys::POLL_REF)
                .and_then(|r| r.parse::<PollId>().ok())
                .or_else(|| match_title(&draft.candidates, &intent.raw_text).map(|p| p.id)),
        };
        let menu = FlowData::PollMenu {
            purpose: MenuPurpose::Vote,
            polls: draft.candidates.clone(),
        };
        let Some(poll_id) = chosen else {
            return FlowResult::reprompt(
                "I couldn't tell which poll you mean. Reply with its number or title.",
                menu,
            );
        };

        match self.services.polls.fetch_active_poll(poll_id).await {
            Ok(Some(poll)) => options_for(state, draft.clone(), poll),
            Ok(None) => FlowResult::failure(
                FlowErrorKind::NotFound,
                "That poll isn't open for voting. Pick another one.",
            )
            .with_data(menu),
            Err(e) => storage_failure("fetch_active_poll", e),
        }
    }

    async fn select_option(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        draft: &VotingDraft,
    ) -> FlowResult {
        let Some(poll_id) = draft.poll_id else {
            warn!(user_id = %context.user_id, "Voting draft without a poll");
            return FlowResult::failure(
                FlowErrorKind::InvalidStateInput,
                "I lost track of which poll you were voting on. Say \"vote\" to start again.",
            )
            .ending();
        };
        let title = draft.poll_title.clone().unwrap_or_default();
        let prompt = FlowData::VoteOptions {
            poll_title: title.clone(),
            options: draft.options.clone(),
        };

        let chosen = match intent.kind {
            IntentType::NumericSelection => pick(&draft.options, intent.number(keys::NUMBER)).cloned(),
            _ => matching_option(&draft.options, &intent.raw_text),
        };
        let Some(choice) = chosen else {
            return FlowResult::reprompt("Please reply with the number of an option.", prompt);
        };

        // The option id is looked up again so a poll edited mid-vote cannot
        // receive a vote for text it no longer has.
        let poll = match self.services.polls.fetch_active_poll(poll_id).await {
            Ok(Some(poll)) => poll,
            Ok(None) => return closed(),
            Err(e) => return storage_failure("fetch_active_poll", e),
        };
        let Some(option) = find_option(&poll, &choice) else {
            return FlowResult::reprompt(
                "That option isn't on the poll any more. Please choose again.",
                FlowData::VoteOptions {
                    poll_title: poll.title.clone(),
                    options: poll.option_texts(),
                },
            );
        };

        match self
            .services
            .polls
            .cast_vote(poll_id, option.id, &context.user_id)
            .await
        {
            Ok(()) => {
                info!(user_id = %context.user_id, poll_id = %poll_id, "Vote recorded");
                FlowResult::finished(FlowData::VoteRecorded {
                    poll_title: poll.title.clone(),
                    option: option.text.clone(),
                })
                .naturalized()
            }
            Err(RepositoryError::AlreadyVoted) => FlowResult::failure(
                FlowErrorKind::InvalidStateInput,
                format!("You've already voted on \"{}\".", poll.title),
            )
            .ending(),
            Err(RepositoryError::PollClosed) => closed(),
            Err(RepositoryError::OptionNotFound) => {
                FlowResult::reprompt("That option isn't on the poll any more.", prompt)
            }
            Err(e) => storage_failure("cast_vote", e),
        }
    }
}

fn closed() -> FlowResult {
    FlowResult::failure(FlowErrorKind::NotFound, "That poll has closed.").ending()
}

fn options_for(state: &ConversationState, mut draft: VotingDraft, poll: Poll) -> FlowResult {
    draft.poll_id = Some(poll.id);
    draft.poll_title = Some(poll.title.clone());
    draft.options = poll.option_texts();

    let step = VotingStep::SelectOption;
    let data = FlowData::VoteOptions {
        poll_title: poll.title,
        options: draft.options.clone(),
    };
    FlowResult::reply(data).with_state(state.advance(FlowState::Voting(VotingState { step, draft })))
}

fn matching_option(options: &[String], text: &str) -> Option<String> {
    let needle = text.trim().to_lowercase();
    options.iter().find(|o| o.to_lowercase() == needle).cloned()
}

fn find_option<'a>(poll: &'a Poll, text: &str) -> Option<&'a PollOption> {
    poll.options
        .iter()
        .find(|o| o.text.eq_ignore_ascii_case(text))
}
