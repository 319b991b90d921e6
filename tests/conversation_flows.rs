//! End-to-end conversation tests.
//!
//! Every scenario drives the public `ChatAssistant` over in-memory adapters,
//! one message at a time, and checks what was persisted and where the
//! conversation ended up.

use std::sync::Arc;

use poll_assistant::adapters::memory::{
    InMemoryChatHistory, InMemoryPollRepository, InMemorySnapshotStore, StaticRoleProvider,
};
use poll_assistant::application::{ChatAssistant, ContextStore, ContextStoreConfig};
use poll_assistant::config::AssistantConfig;
use poll_assistant::domain::conversation::{ConversationContext, UserRole};
use poll_assistant::domain::foundation::UserId;
use poll_assistant::domain::poll::Category;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Chat {
    assistant: ChatAssistant,
    contexts: Arc<ContextStore>,
    polls: InMemoryPollRepository,
    snapshots: InMemorySnapshotStore,
}

impl Chat {
    fn new() -> Self {
        let polls = InMemoryPollRepository::new();
        let snapshots = InMemorySnapshotStore::new();
        let roles = StaticRoleProvider::new(UserRole::User).with_admin(admin());
        let contexts = Arc::new(ContextStore::new(
            Arc::new(snapshots.clone()),
            Arc::new(roles),
            Arc::new(InMemoryChatHistory::new()),
            ContextStoreConfig::default(),
        ));
        let assistant = ChatAssistant::new(
            Arc::new(polls.clone()),
            Arc::clone(&contexts),
            None,
            AssistantConfig::default(),
        );
        Self {
            assistant,
            contexts,
            polls,
            snapshots,
        }
    }

    async fn say(&self, user: &UserId, text: &str) -> String {
        self.assistant.handle_message(user, text).await.content().to_string()
    }

    async fn script(&self, user: &UserId, lines: &[&str]) {
        for line in lines {
            self.say(user, line).await;
        }
    }

    async fn context(&self, user: &UserId) -> ConversationContext {
        self.contexts.load(user).await.unwrap()
    }

    async fn step(&self, user: &UserId) -> &'static str {
        self.context(user).await.step_name()
    }
}

fn admin() -> UserId {
    UserId::new("admin-1").unwrap()
}

fn member() -> UserId {
    UserId::new("member-1").unwrap()
}

// =============================================================================
// Poll creation
// =============================================================================

#[tokio::test]
async fn create_poll_end_to_end() {
    let chat = Chat::new();
    let user = admin();

    chat.say(&user, "create a poll about best programming language").await;
    let context = chat.context(&user).await;
    assert_eq!(context.step_name(), "topic");

    chat.say(&user, "Which programming language is the best?").await;
    assert_eq!(chat.step(&user).await, "options");

    let preview = chat.say(&user, "Python, Rust, Go, TypeScript").await;
    assert_eq!(chat.step(&user).await, "confirm");
    assert!(preview.contains("TypeScript"));

    chat.say(&user, "confirm").await;
    let polls = chat.polls.all().await;
    assert_eq!(polls.len(), 1);
    assert_eq!(polls[0].category, Category::Technology);
    assert_eq!(polls[0].title, "Which programming language is the best?");
    assert_eq!(polls[0].option_texts(), vec!["Python", "Rust", "Go", "TypeScript"]);
    assert!(chat.context(&user).await.current_state.is_none());
}

#[tokio::test]
async fn repeated_confirm_creates_nothing_new() {
    let chat = Chat::new();
    let user = admin();
    chat.script(
        &user,
        &[
            "create a poll about football",
            "Which football team will win the league?",
            "Arsenal, Chelsea, Liverpool",
            "confirm",
        ],
    )
    .await;
    assert_eq!(chat.polls.poll_count().await, 1);

    let reply = chat.say(&user, "confirm").await;
    assert_eq!(chat.polls.poll_count().await, 1);
    assert!(reply.contains("nothing waiting"));
    assert!(chat.context(&user).await.current_state.is_none());
}

#[tokio::test]
async fn duplicate_options_are_rejected_before_confirmation() {
    let chat = Chat::new();
    let user = admin();
    chat.script(
        &user,
        &["create a poll about football", "Which colour should the new kit be?"],
    )
    .await;

    chat.say(&user, "Red, red, Blue").await;
    let context = chat.context(&user).await;
    assert_eq!(context.step_name(), "options");
    assert_eq!(chat.polls.poll_count().await, 0);

    chat.say(&user, "Red, Blue").await;
    assert_eq!(chat.step(&user).await, "confirm");
}

#[tokio::test]
async fn members_cannot_create_polls() {
    let chat = Chat::new();
    let reply = chat.say(&member(), "create a poll about football").await;
    assert!(reply.contains("only admins"));
    assert!(chat.context(&member()).await.current_state.is_none());
}

// =============================================================================
// Poll update
// =============================================================================

#[tokio::test]
async fn add_options_end_to_end() {
    let chat = Chat::new();
    let user = admin();
    let poll = chat.polls.seed_poll(&user, "Best city to live in", &["Chennai"]).await;

    chat.script(&user, &["update my poll", "1", "1"]).await;
    assert_eq!(chat.step(&user).await, "update_options");

    let preview = chat.say(&user, "add Mumbai, Delhi").await;
    assert_eq!(chat.step(&user).await, "confirm_update");
    let chennai = preview.find("Chennai").unwrap();
    let mumbai = preview.rfind("Mumbai").unwrap();
    let delhi = preview.rfind("Delhi").unwrap();
    assert!(chennai < mumbai && mumbai < delhi);

    chat.say(&user, "yes").await;
    let stored = chat.polls.get(poll.id).await.unwrap();
    assert_eq!(stored.option_texts(), vec!["Chennai", "Mumbai", "Delhi"]);
    assert!(chat.context(&user).await.current_state.is_none());
}

#[tokio::test]
async fn add_skips_options_already_present() {
    let chat = Chat::new();
    let user = admin();
    let poll = chat.polls.seed_poll(&user, "Pick a letter", &["A", "B"]).await;

    chat.script(&user, &["update my poll", "1", "options", "add C, A", "yes"]).await;
    let stored = chat.polls.get(poll.id).await.unwrap();
    assert_eq!(stored.option_texts(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn bare_list_replaces_options() {
    let chat = Chat::new();
    let user = admin();
    let poll = chat.polls.seed_poll(&user, "Pick a letter", &["A", "B"]).await;

    chat.script(&user, &["update my poll", "1", "1", "X, Y, Z", "yes"]).await;
    let stored = chat.polls.get(poll.id).await.unwrap();
    assert_eq!(stored.option_texts(), vec!["X", "Y", "Z"]);
}

#[tokio::test]
async fn foreign_poll_is_not_found_and_not_shown() {
    let chat = Chat::new();
    let user = admin();
    let stranger = UserId::new("admin-2").unwrap();
    chat.polls.seed_poll(&user, "My lunch poll", &["Pizza", "Sushi"]).await;
    let foreign = chat.polls.seed_poll(&stranger, "Confidential budget vote", &["Yes", "No"]).await;

    chat.say(&user, "update my poll").await;
    let reply = chat.say(&user, &format!("poll {}", foreign.id)).await;

    assert!(reply.contains("couldn't find"));
    assert!(!reply.contains("Confidential budget vote"));
    assert_eq!(chat.step(&user).await, "select_poll");
    assert_eq!(chat.polls.get(foreign.id).await.unwrap().title, "Confidential budget vote");
}

// =============================================================================
// Reset and topic switches
// =============================================================================

#[tokio::test]
async fn reset_from_every_step_returns_to_idle() {
    let scenarios: &[(&[&str], &str)] = &[
        (&["create a poll"], "category"),
        (&["create a poll about football"], "topic"),
        (&["create a poll about football", "Which team will win the cup?"], "options"),
        (
            &["create a poll about football", "Which team will win the cup?", "Arsenal, Chelsea"],
            "confirm",
        ),
        (&["update my poll"], "select_poll"),
        (&["update my poll", "1"], "select_field"),
        (&["update my poll", "1", "1"], "update_options"),
        (&["update my poll", "1", "2"], "update_title"),
        (&["update my poll", "1", "3"], "update_end_date"),
        (&["update my poll", "1", "4"], "update_category"),
        (&["update my poll", "1", "1", "add Ramen"], "confirm_update"),
        (&["vote"], "select_poll"),
        (&["vote", "1"], "select_option"),
    ];
    let keywords = ["cancel", "stop", "restart", "reset", "start over", "never mind", "quit", "exit"];

    for (i, (lines, step)) in scenarios.iter().enumerate() {
        let chat = Chat::new();
        let user = admin();
        chat.polls.seed_poll(&user, "Lunch spot", &["Pizza", "Sushi"]).await;

        chat.script(&user, lines).await;
        assert_eq!(chat.step(&user).await, *step, "setup for {step}");

        let keyword = keywords[i % keywords.len()];
        chat.say(&user, keyword).await;
        assert!(
            chat.context(&user).await.current_state.is_none(),
            "{keyword} at {step}"
        );

        chat.say(&user, "hello").await;
        assert_eq!(chat.step(&user).await, "idle", "turn after {keyword} at {step}");
    }
}

#[tokio::test]
async fn help_mid_flow_clears_state_and_shows_help() {
    let chat = Chat::new();
    let user = admin();
    chat.say(&user, "create a poll about football").await;

    let reply = chat.say(&user, "help").await;
    assert!(reply.to_lowercase().contains("poll"));
    assert!(chat.context(&user).await.current_state.is_none());
}

#[tokio::test]
async fn poll_question_mentioning_survey_is_taken_as_topic() {
    let chat = Chat::new();
    let user = admin();
    chat.say(&user, "create a poll about football").await;

    chat.say(&user, "Should we run a new survey for the football team?").await;
    assert_eq!(chat.step(&user).await, "options");

    chat.script(&user, &["Arsenal, Chelsea", "confirm"]).await;
    let polls = chat.polls.all().await;
    assert_eq!(polls.len(), 1);
    assert_eq!(polls[0].title, "Should we run a new survey for the football team?");
}

#[tokio::test]
async fn new_title_mentioning_polls_stays_in_update() {
    let chat = Chat::new();
    let user = admin();
    let poll = chat.polls.seed_poll(&user, "Lunch spot", &["Pizza", "Sushi"]).await;
    chat.script(&user, &["update my poll", "1", "2"]).await;
    assert_eq!(chat.step(&user).await, "update_title");

    chat.say(&user, "Which team should we show in the polls page?").await;
    assert_eq!(chat.step(&user).await, "confirm_update");

    chat.say(&user, "yes").await;
    let stored = chat.polls.get(poll.id).await.unwrap();
    assert_eq!(stored.title, "Which team should we show in the polls page?");
}

#[tokio::test]
async fn short_command_still_leaves_a_text_step() {
    let chat = Chat::new();
    let user = admin();
    chat.polls.seed_poll(&user, "Tea or coffee", &["Tea", "Coffee"]).await;
    chat.say(&user, "create a poll about football").await;

    let listing = chat.say(&user, "show active polls").await;
    assert!(listing.contains("Tea or coffee"));
    assert_ne!(chat.step(&user).await, "topic");
    assert_eq!(chat.polls.poll_count().await, 1);
}

// =============================================================================
// Listing and voting
// =============================================================================

#[tokio::test]
async fn listing_then_number_shows_details() {
    let chat = Chat::new();
    let owner = admin();
    chat.polls.seed_poll(&owner, "Tea or coffee", &["Tea", "Coffee"]).await;
    chat.polls.seed_poll(&owner, "Cats or dogs", &["Cats", "Dogs"]).await;

    let listing = chat.say(&member(), "show active polls").await;
    assert!(listing.contains("Cats or dogs"));

    let details = chat.say(&member(), "2").await;
    assert!(details.contains("Tea or coffee"));
    assert!(details.contains("Coffee"));
}

#[tokio::test]
async fn member_votes_once() {
    let chat = Chat::new();
    let poll = chat.polls.seed_poll(&admin(), "Tea or coffee", &["Tea", "Coffee"]).await;

    chat.script(&member(), &["vote", "1", "Coffee"]).await;
    chat.script(&member(), &["vote", "1", "Tea"]).await;

    let stored = chat.polls.get(poll.id).await.unwrap();
    let votes: Vec<u32> = stored.options.iter().map(|o| o.votes).collect();
    assert_eq!(votes, vec![0, 1]);

    let voted = chat.say(&member(), "polls I voted on").await;
    assert!(voted.contains("Tea or coffee"));
}

// =============================================================================
// Persistence of the conversation itself
// =============================================================================

#[tokio::test]
async fn context_is_snapshotted_each_turn() {
    let chat = Chat::new();
    let user = admin();
    chat.say(&user, "create a poll about football").await;
    assert_eq!(chat.snapshots.snapshot_count().await, 1);
    assert_eq!(chat.context(&user).await.version, 1);

    chat.say(&user, "Which team will win the cup?").await;
    assert_eq!(chat.context(&user).await.version, 2);
}
