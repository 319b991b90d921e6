//! Deterministic text for every flow payload.
//!
//! A rendering is split into an intro sentence and a structured body. The
//! body carries ids, counts and option order and is never rewritten; only
//! the intro may be replaced by generated prose.

use crate::domain::poll::{Category, PollField, PollSummary};

use super::flow_result::{FlowData, ListingKind, MenuPurpose};
use super::intent::OptionEditMode;

/// Shown when an unexpected error reaches the assistant boundary.
pub const GENERIC_APOLOGY: &str =
    "Sorry, something went wrong on my side. Please try again in a moment.";

/// Shown when unclassified input cannot be answered.
pub const CLARIFICATION: &str = "I'm not sure what you mean. You can ask me to create a poll, update one of your polls, vote, or list polls. Type \"help\" to see everything I can do.";

/// Deterministic rendering of one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub intro: String,
    pub body: String,
}

impl Rendered {
    fn new(intro: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            intro: intro.into(),
            body: body.into(),
        }
    }

    fn intro_only(intro: impl Into<String>) -> Self {
        Self::new(intro, String::new())
    }

    /// Intro and body joined as a single message.
    pub fn text(&self) -> String {
        join_nonempty(&[&self.intro, &self.body])
    }
}

/// Joins non-empty parts with a blank line.
pub fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn category_menu() -> String {
    Category::all()
        .iter()
        .map(|c| format!("{}. {}", c.menu_number(), c.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn field_menu() -> String {
    PollField::all()
        .iter()
        .map(|f| format!("{}. Change {}", f.menu_number(), f.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn poll_lines(polls: &[PollSummary]) -> String {
    polls
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let status = if p.is_active { "active" } else { "closed" };
            let ends = p
                .ends_at
                .map(|t| format!(", ends {}", t.date_string()))
                .unwrap_or_default();
            format!(
                "{}. {} [{}] ({} options, {}{})",
                i + 1,
                p.title,
                p.category,
                p.option_count,
                status,
                ends
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn help_text() -> String {
    [
        "Here's what I can help with:",
        "- \"Create a poll about <topic>\" to start a new poll (admins)",
        "- \"Update my poll\" to change title, options, end date or category (admins)",
        "- \"Show active polls\", \"show my polls\", \"show 5 recent polls\", \"polls I voted on\"",
        "- \"Vote\" to cast a vote on an active poll",
        "- \"cancel\" or \"start over\" at any time to leave the current task",
    ]
    .join("\n")
}

fn mode_label(mode: Option<OptionEditMode>) -> &'static str {
    match mode {
        Some(OptionEditMode::Add) => "add to existing options",
        _ => "replace all options",
    }
}

/// Renders a payload into intro and body.
pub fn render(data: &FlowData) -> Rendered {
    match data {
        FlowData::CategoryMenu => Rendered::new(
            "Let's create a poll. Which category fits best? Reply with a number or a name.",
            category_menu(),
        ),
        FlowData::TopicPrompt { category } => Rendered::intro_only(format!(
            "Great, {} it is. What question should the poll ask? You can also say \"suggest\" for ideas.",
            category
        )),
        FlowData::TopicSuggestions {
            category,
            suggestions,
        } => Rendered::new(
            format!(
                "Here are some {} poll ideas. Pick a number or type your own question.",
                category
            ),
            numbered(suggestions),
        ),
        FlowData::OptionsPrompt { topic } => Rendered::new(
            "Now list the answer options, separated by commas (at least 2). Say \"suggest\" if you'd like ideas.",
            format!("Question: {}", topic),
        ),
        FlowData::OptionSuggestions { topic, suggestions } => Rendered::new(
            "Here are some options you could use. Reply with numbers like \"1, 3\", \"all\", or your own list.",
            format!("Question: {}\n{}", topic, numbered(suggestions)),
        ),
        FlowData::CreationPreview {
            category,
            topic,
            options,
        } => Rendered::new(
            "Here's your poll. Reply \"confirm\" to publish it, \"edit\" to start over, or \"cancel\".",
            format!(
                "Category: {}\nQuestion: {}\nOptions ({}):\n{}",
                category,
                topic,
                options.len(),
                numbered(options)
            ),
        ),
        FlowData::PollCreated {
            poll_id,
            title,
            category,
            options,
        } => Rendered::new(
            "Your poll has been created.",
            format!(
                "Poll ID: {}\nCategory: {}\nQuestion: {}\nOptions ({}):\n{}",
                poll_id,
                category,
                title,
                options.len(),
                numbered(options)
            ),
        ),
        FlowData::PollMenu { purpose, polls } => {
            let intro = match purpose {
                MenuPurpose::Update => "Which of your polls would you like to update? Reply with its number or title.",
                MenuPurpose::Vote => "Which poll would you like to vote on? Reply with its number or title.",
            };
            Rendered::new(intro, poll_lines(polls))
        }
        FlowData::FieldMenu { poll_title } => Rendered::new(
            format!("What would you like to change in \"{}\"?", poll_title),
            field_menu(),
        ),
        FlowData::FieldPrompt {
            field,
            poll_title,
            current,
        } => {
            let intro = match field {
                PollField::Options => format!(
                    "Send the options for \"{}\". Say \"add X, Y\" to keep the current ones or \"replace with X, Y\" to start fresh.",
                    poll_title
                ),
                PollField::Title => format!("What should the new title of \"{}\" be?", poll_title),
                PollField::EndDate => "When should the poll end? Use YYYY-MM-DD, \"in 3 days\", or \"extend\" for one more week.".to_string(),
                PollField::Category => "Which category should the poll have? Reply with a number or a name.".to_string(),
            };
            let body = match field {
                PollField::Options => format!("Current options:\n{}", numbered(current)),
                PollField::Category => category_menu(),
                _ => current
                    .first()
                    .map(|c| format!("Current {}: {}", field.label(), c))
                    .unwrap_or_default(),
            };
            Rendered::new(intro, body)
        }
        FlowData::OptionModePrompt {
            current,
            remembered,
        } => {
            let intro = match remembered {
                Some(OptionEditMode::Add) => "Got it, you want to add. Which options should I add?",
                Some(OptionEditMode::Replace) => "Got it, you want to replace. What should the new options be?",
                _ => "Do you want to add to the current options or replace them? Say \"add X, Y\" or \"replace with X, Y\".",
            };
            Rendered::new(intro, format!("Current options:\n{}", numbered(current)))
        }
        FlowData::UpdatePreview {
            poll_title,
            field,
            before,
            after,
            mode,
            defaulted_end_date,
        } => {
            let mut body = format!("Poll: {}\nField: {}\n", poll_title, field);
            if *field == PollField::Options {
                body.push_str(&format!("Mode: {}\n", mode_label(*mode)));
                body.push_str(&format!("Before ({}):\n{}\n", before.len(), numbered(before)));
                body.push_str(&format!("After ({}):\n{}", after.len(), numbered(after)));
            } else {
                body.push_str(&format!(
                    "Before: {}\nAfter: {}",
                    before.first().map_or("(none)", String::as_str),
                    after.first().map_or("(none)", String::as_str)
                ));
            }
            if *defaulted_end_date {
                body.push_str("\nNo date was given, so the default extension of 7 days from now was used.");
            }
            Rendered::new(
                "Please review the change. Reply \"yes\" to apply it, \"edit\" to pick another field, or \"cancel\".",
                body,
            )
        }
        FlowData::PollUpdated {
            poll_id,
            poll_title,
            field,
            after,
        } => Rendered::new(
            format!("\"{}\" has been updated.", poll_title),
            format!("Poll ID: {}\nNew {}:\n{}", poll_id, field, numbered(after)),
        ),
        FlowData::PollList { listing, polls } => {
            let heading = match listing {
                ListingKind::Active => "Active polls".to_string(),
                ListingKind::Mine => "Your polls".to_string(),
                ListingKind::Recent { limit } => format!("The {} most recent polls", limit),
                ListingKind::Voted => "Polls you voted on".to_string(),
            };
            if polls.is_empty() {
                Rendered::intro_only(format!("{}: nothing to show yet.", heading))
            } else {
                Rendered::new(
                    format!("{} ({}). Reply with a number to see details.", heading, polls.len()),
                    poll_lines(polls),
                )
            }
        }
        FlowData::PollDetails { poll } => {
            let options = poll
                .options
                .iter()
                .enumerate()
                .map(|(i, o)| format!("{}. {} ({} votes)", i + 1, o.text, o.votes))
                .collect::<Vec<_>>()
                .join("\n");
            let ends = poll
                .ends_at
                .map(|t| t.date_string())
                .unwrap_or_else(|| "no end date".to_string());
            Rendered::new(
                format!("Here are the details of \"{}\".", poll.title),
                format!(
                    "Poll ID: {}\nCategory: {}\nStatus: {}\nEnds: {}\nOptions:\n{}",
                    poll.id,
                    poll.category,
                    if poll.is_active { "active" } else { "closed" },
                    ends,
                    options
                ),
            )
        }
        FlowData::VoteOptions {
            poll_title,
            options,
        } => Rendered::new(
            format!("Which option do you pick for \"{}\"?", poll_title),
            numbered(options),
        ),
        FlowData::VoteRecorded { poll_title, option } => Rendered::intro_only(format!(
            "Thanks! Your vote for \"{}\" on \"{}\" has been recorded.",
            option, poll_title
        )),
        FlowData::Cancelled => Rendered::intro_only("Okay, I've cancelled that. Nothing was saved."),
        FlowData::Reset => Rendered::intro_only("All cleared. What would you like to do next?"),
        FlowData::Help => Rendered::intro_only(help_text()),
        FlowData::Greeting => Rendered::intro_only(
            "Hi! I can help you create, update, find and vote on polls. What would you like to do?",
        ),
        FlowData::Clarify => Rendered::intro_only(CLARIFICATION),
    }
}

/// Message for a rate-limited request.
pub fn retry_later(retry_after_secs: u64) -> String {
    format!(
        "I'm handling a lot of requests right now. Please try again in about {} seconds.",
        retry_after_secs.max(1)
    )
}
