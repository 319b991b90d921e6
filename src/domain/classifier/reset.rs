//! Reset keywords. These always win, whatever flow is active.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::conversation::{keys, Intent, IntentType};

static RESET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:please\s+)?(cancel|stop|restart|reset|start over|start again|never ?mind|quit|exit|abort|forget it)(?:\s+(?:please|that|it|this|now|everything|all|the poll|this poll|poll))*$",
    )
    .expect("reset pattern must compile")
});

static HELP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:help|help me|help please|please help|i need help|menu|commands|show commands)$")
        .expect("help pattern must compile")
});

/// Lowercases and strips surrounding punctuation.
pub(crate) fn normalize(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns a `Reset` or `Help` intent for reset keywords.
pub fn detect_reset(text: &str) -> Option<Intent> {
    let normalized = normalize(text);
    if HELP.is_match(&normalized) {
        return Some(Intent::new(IntentType::Help, 1.0, text).with_text(keys::KEYWORD, "help"));
    }
    RESET.captures(&normalized).map(|caps| {
        Intent::new(IntentType::Reset, 1.0, text).with_text(keys::KEYWORD, &caps[1])
    })
}
