//! Poll update: `select_poll -> select_field -> <field step> -> confirm_update`.
//!
//! The chosen change is buffered in the draft and shown as a before/after
//! preview. Nothing is written until the user confirms, and then the change
//! is applied as a single repository call.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::classifier::DEFAULT_EXTENSION_DAYS;
use crate::domain::conversation::{
    keys, ConversationContext, ConversationState, FlowData, FlowErrorKind, FlowResult, FlowState,
    Intent, IntentType, MenuPurpose, OptionEditMode, UpdateDraft, UpdateState, UpdateStep,
};
use crate::domain::foundation::{PollId, StateMachine, Timestamp, UserId};
use crate::domain::poll::{
    merge_unique, validate_options, validate_title, Category, Poll, PollChange, PollField,
};

use super::{forbidden, match_title, pick, storage_failure, FlowController, FlowServices};

pub struct PollUpdateFlow {
    services: FlowServices,
}

#[async_trait]
impl FlowController for PollUpdateFlow {
    async fn handle_intent(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        if !context.is_admin() {
            return forbidden();
        }

        let current = context.current_state.as_ref().and_then(|state| match &state.flow {
            FlowState::PollUpdate(update) => Some((state, update)),
            _ => None,
        });

        let Some((state, update)) = current else {
            return self.start(intent, context).await;
        };

        debug!(user_id = %context.user_id, step = update.step.as_str(), intent = %intent.kind, "Update step");
        let step = Step {
            state,
            draft: update.draft.clone(),
        };
        match update.step {
            UpdateStep::SelectPoll => self.select_poll(intent, context, step).await,
            UpdateStep::SelectField => self.select_field(intent, step),
            UpdateStep::UpdateTitle => self.update_title(intent, step),
            UpdateStep::UpdateOptions => self.update_options(intent, step),
            UpdateStep::UpdateCategory => self.update_category(intent, step),
            UpdateStep::UpdateEndDate => self.update_end_date(intent, step),
            UpdateStep::ConfirmUpdate => self.confirm(intent, context, step).await,
        }
    }
}

/// The state being advanced and a working copy of its draft.
struct Step<'a> {
    state: &'a ConversationState,
    draft: UpdateDraft,
}

impl Step<'_> {
    fn to(self, step: UpdateStep) -> ConversationState {
        self.state
            .advance(FlowState::PollUpdate(UpdateState { step, draft: self.draft }))
    }

    fn title(&self) -> String {
        self.draft.poll_title.clone().unwrap_or_default()
    }
}

impl PollUpdateFlow {
    pub fn new(services: FlowServices) -> Self {
        Self { services }
    }

    async fn start(&self, intent: &Intent, context: &ConversationContext) -> FlowResult {
        let user = &context.user_id;
        if let Some(id) = intent.text(keys::POLL_REF).and_then(|r| r.parse::<PollId>().ok()) {
            return match self.owned_poll(id, user).await {
                Ok(Some(poll)) => self.enter_field_menu(None, UpdateDraft::default(), poll),
                Ok(None) => not_found().ending(),
                Err(result) => result.ending(),
            };
        }

        let polls = match self.services.polls.fetch_polls_by_owner(user).await {
            Ok(polls) => polls,
            Err(e) => return storage_failure("fetch_polls_by_owner", e).ending(),
        };
        if polls.is_empty() {
            return FlowResult::failure(
                FlowErrorKind::NotFound,
                "You don't have any polls to update yet. Say \"create a poll\" to make one.",
            )
            .ending();
        }

        let candidates: Vec<_> = polls.iter().map(Poll::summary).collect();
        if let Some(summary) = intent.text(keys::SUBJECT).and_then(|s| match_title(&candidates, s)) {
            if let Some(poll) = polls.iter().find(|p| p.id == summary.id) {
                let draft = UpdateDraft {
                    candidates: candidates.clone(),
                    ..UpdateDraft::default()
                };
                return self.enter_field_menu(None, draft, poll.clone());
            }
        }

        info!(user_id = %user, polls = candidates.len(), "Poll update started");
        let state = UpdateState {
            step: UpdateStep::SelectPoll,
            draft: UpdateDraft {
                candidates: candidates.clone(),
                ..UpdateDraft::default()
            },
        };
        FlowResult::reply(FlowData::PollMenu {
            purpose: MenuPurpose::Update,
            polls: candidates,
        })
        .with_state(ConversationState::update(state))
    }

    async fn owned_poll(&self, id: PollId, user: &UserId) -> Result<Option<Poll>, FlowResult> {
        self.services
            .polls
            .fetch_poll_by_id_and_owner(id, user)
            .await
            .map_err(|e| storage_failure("fetch_poll_by_id_and_owner", e))
    }

    async fn select_poll(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        step: Step<'_>,
    ) -> FlowResult {
        let chosen = match intent.kind {
            IntentType::NumericSelection => {
                pick(&step.draft.candidates, intent.number(keys::NUMBER)).map(|p| p.id)
            }
            _ => intent
                .text(keys::POLL_REF)
                .and_then(|r| r.parse::<PollId>().ok())
                .or_else(|| match_title(&step.draft.candidates, &intent.raw_text).map(|p| p.id)),
        };

        let Some(id) = chosen else {
            return FlowResult::reprompt(
                "I couldn't tell which poll you mean. Reply with its number or title.",
                poll_menu(&step.draft),
            );
        };

        match self.owned_poll(id, &context.user_id).await {
            Ok(Some(poll)) => self.enter_field_menu(Some(step.state), step.draft, poll),
            Ok(None) => {
                debug!(user_id = %context.user_id, poll_id = %id, "Poll not found for owner");
                not_found().with_data(poll_menu(&step.draft))
            }
            Err(result) => result,
        }
    }

    fn enter_field_menu(
        &self,
        state: Option<&ConversationState>,
        mut draft: UpdateDraft,
        poll: Poll,
    ) -> FlowResult {
        draft.poll_id = Some(poll.id);
        draft.poll_title = Some(poll.title.clone());
        draft.current_options = poll.option_texts();
        draft.current_category = Some(poll.category);
        draft.current_end_date = poll.ends_at;
        draft.option_mode = None;
        draft.pending = None;
        draft.pending_mode = None;
        draft.defaulted_end_date = false;

        let flow = FlowState::PollUpdate(UpdateState {
            step: UpdateStep::SelectField,
            draft,
        });
        let next = match state {
            Some(state) => state.advance(flow),
            None => ConversationState::new(flow),
        };
        FlowResult::reply(FlowData::FieldMenu {
            poll_title: poll.title,
        })
        .with_state(next)
    }

    fn select_field(&self, intent: &Intent, step: Step<'_>) -> FlowResult {
        if intent.kind == IntentType::ModifyOptions {
            return self.update_options(intent, step);
        }

        let field = match intent.kind {
            IntentType::SelectField => intent.text(keys::FIELD).and_then(PollField::from_key),
            _ => None,
        };
        let Some(field) = field else {
            let detail = if intent.notes.as_deref() == Some("ambiguous_field") {
                "Please pick just one thing to change."
            } else {
                "Please pick what to change by number or name."
            };
            return FlowResult::reprompt(detail, FlowData::FieldMenu {
                poll_title: step.title(),
            });
        };

        let target = match field {
            PollField::Options => UpdateStep::UpdateOptions,
            PollField::Title => UpdateStep::UpdateTitle,
            PollField::EndDate => UpdateStep::UpdateEndDate,
            PollField::Category => UpdateStep::UpdateCategory,
        };
        if !UpdateStep::SelectField.can_transition_to(&target) {
            return FlowResult::reprompt("Please pick what to change.", FlowData::FieldMenu {
                poll_title: step.title(),
            });
        }

        let data = field_prompt(field, &step.draft);
        FlowResult::reply(data).with_state(step.to(target))
    }

    fn update_title(&self, intent: &Intent, step: Step<'_>) -> FlowResult {
        let title = match validate_title(&intent.raw_text) {
            Ok(title) => title,
            Err(e) => {
                return FlowResult::reprompt(
                    format!("That title can't be used: {}.", e),
                    field_prompt(PollField::Title, &step.draft),
                )
            }
        };
        if step.draft.poll_title.as_deref() == Some(title.as_str()) {
            return FlowResult::reprompt(
                "That's the current title. Please send a different one.",
                field_prompt(PollField::Title, &step.draft),
            );
        }
        preview(step, PollChange::Title(title), None)
    }

    fn update_options(&self, intent: &Intent, mut step: Step<'_>) -> FlowResult {
        let requested = intent.list(keys::OPTIONS).map(<[String]>::to_vec).unwrap_or_default();

        let mode = match (intent.kind, intent.option_mode()) {
            (IntentType::ModifyOptions, Some(OptionEditMode::Clarify)) => {
                step.draft.option_mode = intent.remembered_mode();
                return ask_mode(step);
            }
            (IntentType::ModifyOptions, Some(mode)) if requested.is_empty() => {
                step.draft.option_mode = Some(mode);
                return ask_mode(step);
            }
            (IntentType::ModifyOptions, Some(mode)) => mode,
            (IntentType::ProvideInput, _) if !requested.is_empty() => {
                step.draft.option_mode.unwrap_or(OptionEditMode::Replace)
            }
            _ => {
                return FlowResult::reprompt(
                    "Send the options separated by commas, e.g. \"add X, Y\" or \"replace with X, Y\".",
                    field_prompt(PollField::Options, &step.draft),
                )
            }
        };

        let current = &step.draft.current_options;
        let after = match mode {
            OptionEditMode::Add => {
                let merged = merge_unique(current, &requested);
                if merged.len() == current.len() {
                    return FlowResult::reprompt(
                        "All of those options are already on the poll.",
                        field_prompt(PollField::Options, &step.draft),
                    );
                }
                merged
            }
            _ => requested,
        };

        if let Err(e) = validate_options(&after) {
            return FlowResult::reprompt(
                format!("Those options don't work: {}.", e),
                field_prompt(PollField::Options, &step.draft),
            );
        }
        preview(step, PollChange::Options(after), Some(mode))
    }

    fn update_category(&self, intent: &Intent, step: Step<'_>) -> FlowResult {
        let Some(category) = intent.text(keys::CATEGORY).and_then(|c| c.parse::<Category>().ok())
        else {
            return FlowResult::reprompt(
                "Please choose one of the categories below.",
                field_prompt(PollField::Category, &step.draft),
            );
        };
        if step.draft.current_category == Some(category) {
            return FlowResult::reprompt(
                format!("The poll is already in {}. Pick another category.", category),
                field_prompt(PollField::Category, &step.draft),
            );
        }
        preview(step, PollChange::Category(category), None)
    }

    fn update_end_date(&self, intent: &Intent, mut step: Step<'_>) -> FlowResult {
        let requested = match intent.kind {
            IntentType::SetEndDate => intent.text(keys::END_DATE).and_then(Timestamp::parse_rfc3339),
            _ => None,
        };
        let Some(at) = requested else {
            return FlowResult::reprompt(
                "I couldn't read that date. Try YYYY-MM-DD, \"in 3 days\" or \"extend\".",
                field_prompt(PollField::EndDate, &step.draft),
            );
        };
        if !at.is_after(&Timestamp::now()) {
            return FlowResult::reprompt(
                "The end date has to be in the future.",
                field_prompt(PollField::EndDate, &step.draft),
            );
        }

        step.draft.defaulted_end_date = intent.flag(keys::DEFAULTED);
        if step.draft.defaulted_end_date {
            debug!(days = DEFAULT_EXTENSION_DAYS, "End date defaulted");
        }
        preview(step, PollChange::EndDate(at), None)
    }

    async fn confirm(
        &self,
        intent: &Intent,
        context: &ConversationContext,
        mut step: Step<'_>,
    ) -> FlowResult {
        let (Some(poll_id), Some(change)) = (step.draft.poll_id, step.draft.pending.clone()) else {
            return FlowResult::reprompt(
                "There's no change waiting to be applied. Pick what to change.",
                FlowData::FieldMenu {
                    poll_title: step.title(),
                },
            )
            .with_state(step.to(UpdateStep::SelectField));
        };

        match intent.kind {
            IntentType::Confirm => {
                let user = &context.user_id;
                match self.services.polls.update_poll_field(poll_id, user, &change).await {
                    Ok(poll) => {
                        info!(user_id = %user, poll_id = %poll.id, field = %change.field(), "Poll updated");
                        FlowResult::finished(FlowData::PollUpdated {
                            poll_id: poll.id,
                            poll_title: poll.title.clone(),
                            field: change.field(),
                            after: field_values(change.field(), &poll),
                        })
                        .naturalized()
                    }
                    Err(e) => storage_failure("update_poll_field", e),
                }
            }
            IntentType::Edit => {
                step.draft.pending = None;
                step.draft.pending_mode = None;
                step.draft.defaulted_end_date = false;
                let data = FlowData::FieldMenu {
                    poll_title: step.title(),
                };
                FlowResult::reply(data).with_state(step.to(UpdateStep::SelectField))
            }
            IntentType::Decline => FlowResult::finished(FlowData::Cancelled),
            _ => FlowResult::reprompt(
                "Please reply \"yes\" to apply the change, \"edit\" or \"cancel\".",
                preview_data(&step.draft, &change),
            ),
        }
    }
}

fn not_found() -> FlowResult {
    FlowResult::failure(
        FlowErrorKind::NotFound,
        "I couldn't find that poll among yours.",
    )
}

fn poll_menu(draft: &UpdateDraft) -> FlowData {
    FlowData::PollMenu {
        purpose: MenuPurpose::Update,
        polls: draft.candidates.clone(),
    }
}

fn ask_mode(step: Step<'_>) -> FlowResult {
    let data = FlowData::OptionModePrompt {
        current: step.draft.current_options.clone(),
        remembered: step.draft.option_mode,
    };
    FlowResult::reply(data).with_state(step.to(UpdateStep::UpdateOptions))
}

fn current_values(field: PollField, draft: &UpdateDraft) -> Vec<String> {
    match field {
        PollField::Options => draft.current_options.clone(),
        PollField::Title => draft.poll_title.iter().cloned().collect(),
        PollField::EndDate => draft.current_end_date.iter().map(Timestamp::date_string).collect(),
        PollField::Category => draft
            .current_category
            .iter()
            .map(|c| c.label().to_string())
            .collect(),
    }
}

fn field_values(field: PollField, poll: &Poll) -> Vec<String> {
    match field {
        PollField::Options => poll.option_texts(),
        PollField::Title => vec![poll.title.clone()],
        PollField::EndDate => poll.ends_at.iter().map(Timestamp::date_string).collect(),
        PollField::Category => vec![poll.category.label().to_string()],
    }
}

fn change_values(change: &PollChange) -> Vec<String> {
    match change {
        PollChange::Title(title) => vec![title.clone()],
        PollChange::Options(options) => options.clone(),
        PollChange::Category(category) => vec![category.label().to_string()],
        PollChange::EndDate(at) => vec![at.date_string()],
    }
}

fn field_prompt(field: PollField, draft: &UpdateDraft) -> FlowData {
    FlowData::FieldPrompt {
        field,
        poll_title: draft.poll_title.clone().unwrap_or_default(),
        current: current_values(field, draft),
    }
}

fn preview_data(draft: &UpdateDraft, change: &PollChange) -> FlowData {
    let field = change.field();
    FlowData::UpdatePreview {
        poll_title: draft.poll_title.clone().unwrap_or_default(),
        field,
        before: current_values(field, draft),
        after: change_values(change),
        mode: draft.pending_mode,
        defaulted_end_date: draft.defaulted_end_date,
    }
}

/// Buffers `change` and moves to the confirmation step.
fn preview(mut step: Step<'_>, change: PollChange, mode: Option<OptionEditMode>) -> FlowResult {
    if change.field() != PollField::EndDate {
        step.draft.defaulted_end_date = false;
    }
    step.draft.pending_mode = mode;
    let data = preview_data(&step.draft, &change);
    step.draft.pending = Some(change);
    FlowResult::reply(data).with_state(step.to(UpdateStep::ConfirmUpdate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPollRepository;
    use crate::domain::classifier::PatternIntentClassifier;
    use crate::domain::conversation::UserRole;
    use std::sync::Arc;

    struct Harness {
        flow: PollUpdateFlow,
        polls: InMemoryPollRepository,
        context: ConversationContext,
        classifier: PatternIntentClassifier,
    }

    impl Harness {
        fn new() -> Self {
            let polls = InMemoryPollRepository::new();
            Self {
                flow: PollUpdateFlow::new(FlowServices::new(Arc::new(polls.clone()), None)),
                polls,
                context: ConversationContext::new(owner(), UserRole::Admin),
                classifier: PatternIntentClassifier::new(),
            }
        }

        async fn say(&mut self, text: &str) -> FlowResult {
            let intent = self.classifier.classify(text, &self.context);
            let result = self.flow.handle_intent(&intent, &self.context).await;
            if result.should_end_flow {
                self.context.current_state = None;
            } else if let Some(state) = result.context_update.as_ref().and_then(|u| u.state.clone()) {
                self.context.current_state = Some(state);
            }
            result
        }

        /// Puts the user at `update_options` for `poll`.
        fn at_options(&mut self, poll: &Poll) {
            self.context.current_state = Some(ConversationState::update(UpdateState {
                step: UpdateStep::UpdateOptions,
                draft: UpdateDraft {
                    poll_id: Some(poll.id),
                    poll_title: Some(poll.title.clone()),
                    current_options: poll.option_texts(),
                    current_category: Some(poll.category),
                    ..UpdateDraft::default()
                },
            }));
        }
    }

    fn owner() -> UserId {
        UserId::new("owner").unwrap()
    }

    fn preview_after(result: &FlowResult) -> Vec<String> {
        match &result.data {
            Some(FlowData::UpdatePreview { after, .. }) => after.clone(),
            other => panic!("expected preview, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn add_merges_without_duplicates() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Pick a letter", &["A", "B"]).await;
        h.at_options(&poll);

        let result = h.say("add C, A").await;
        assert_eq!(preview_after(&result), vec!["A", "B", "C"]);

        h.say("yes").await;
        assert_eq!(h.polls.get(poll.id).await.unwrap().option_texts(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn bare_list_replaces_and_says_so() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Pick a letter", &["A", "B"]).await;
        h.at_options(&poll);

        let result = h.say("X, Y, Z").await;
        assert_eq!(preview_after(&result), vec!["X", "Y", "Z"]);
        assert!(matches!(
            result.data,
            Some(FlowData::UpdatePreview { mode: Some(OptionEditMode::Replace), .. })
        ));

        h.say("confirm").await;
        assert_eq!(h.polls.get(poll.id).await.unwrap().option_texts(), vec!["X", "Y", "Z"]);
    }

    #[tokio::test]
    async fn negated_mode_asks_again_and_remembers() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Pick a letter", &["A", "B"]).await;
        h.at_options(&poll);

        let result = h.say("don't replace them, I want to add").await;
        assert!(matches!(
            result.data,
            Some(FlowData::OptionModePrompt { remembered: Some(OptionEditMode::Add), .. })
        ));
        assert_eq!(h.context.step_name(), "update_options");

        let result = h.say("C, D").await;
        assert_eq!(preview_after(&result), vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn another_owners_poll_is_not_found() {
        let mut h = Harness::new();
        let stranger = UserId::new("stranger").unwrap();
        let foreign = h.polls.seed_poll(&stranger, "Secret ballot", &["A", "B"]).await;
        h.polls.seed_poll(&owner(), "My own poll", &["A", "B"]).await;

        h.say("update my poll").await;
        assert_eq!(h.context.step_name(), "select_poll");

        let result = h.say(&format!("poll {}", foreign.id)).await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::NotFound));
        let leaked = format!("{:?}", result);
        assert!(!leaked.contains("Secret ballot"));
        assert_eq!(h.context.step_name(), "select_poll");
    }

    #[tokio::test]
    async fn select_by_number_then_field_then_title() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Lunch spot", &["Pizza", "Sushi"]).await;

        h.say("update my poll").await;
        let result = h.say("1").await;
        assert!(matches!(result.data, Some(FlowData::FieldMenu { .. })));

        h.say("2").await;
        assert_eq!(h.context.step_name(), "update_title");

        let result = h.say("Where should we eat lunch?").await;
        assert_eq!(preview_after(&result), vec!["Where should we eat lunch?"]);
        h.say("yes").await;
        assert_eq!(h.polls.get(poll.id).await.unwrap().title, "Where should we eat lunch?");
        assert!(h.context.current_state.is_none());
    }

    #[tokio::test]
    async fn extend_defaults_a_week_and_flags_it() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Lunch spot", &["Pizza", "Sushi"]).await;
        h.say("update my poll").await;
        h.say("1").await;
        h.say("the end date").await;

        let result = h.say("extend").await;
        assert!(matches!(
            result.data,
            Some(FlowData::UpdatePreview { defaulted_end_date: true, .. })
        ));
        h.say("yes").await;
        let ends = h.polls.get(poll.id).await.unwrap().ends_at.unwrap();
        assert!(ends.is_after(&Timestamp::now().plus_days(6)));
    }

    #[tokio::test]
    async fn past_end_date_is_rejected() {
        let mut h = Harness::new();
        h.polls.seed_poll(&owner(), "Lunch spot", &["Pizza", "Sushi"]).await;
        h.say("update my poll").await;
        h.say("1").await;
        h.say("3").await;

        let result = h.say("2001-01-01").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::InvalidStateInput));
        assert_eq!(h.context.step_name(), "update_end_date");
    }

    #[tokio::test]
    async fn category_change_previews_labels() {
        let mut h = Harness::new();
        h.polls.seed_poll(&owner(), "Lunch spot", &["Pizza", "Sushi"]).await;
        h.say("update my poll").await;
        h.say("1").await;
        h.say("category").await;

        let result = h.say("sports").await;
        assert_eq!(preview_after(&result), vec!["Sports"]);
    }

    #[tokio::test]
    async fn edit_at_confirm_returns_to_field_menu() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Pick a letter", &["A", "B"]).await;
        h.at_options(&poll);
        h.say("add C").await;

        let result = h.say("edit").await;
        assert!(matches!(result.data, Some(FlowData::FieldMenu { .. })));
        assert_eq!(h.context.step_name(), "select_field");
        assert_eq!(h.polls.get(poll.id).await.unwrap().option_texts(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn failed_update_keeps_preview() {
        let mut h = Harness::new();
        let poll = h.polls.seed_poll(&owner(), "Pick a letter", &["A", "B"]).await;
        h.at_options(&poll);
        h.say("add C").await;

        h.polls.fail_updates(true);
        let result = h.say("yes").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::PersistenceFailure));
        assert_eq!(h.context.step_name(), "confirm_update");
    }

    #[tokio::test]
    async fn user_without_polls_is_told_so() {
        let mut h = Harness::new();
        let result = h.say("update my poll").await;
        assert_eq!(result.error_kind(), Some(&FlowErrorKind::NotFound));
        assert!(h.context.current_state.is_none());
    }
}
