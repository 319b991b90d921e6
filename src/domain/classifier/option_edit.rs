//! Add / replace / clarify detection for option edits.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::conversation::OptionEditMode;
use crate::domain::poll::parse_option_list;

const ADD_WORDS: &str = r"add|append|include";
const REPLACE_WORDS: &str = r"replace|swap|overwrite|substitute";

/// Words that also occur inside option names ("Disney Plus"). They only
/// count as edit verbs at the start of the message, or trailing it for
/// `also`, `only` and `instead`.
const SOFT_ADD_WORDS: &str = r"also|plus";
const SOFT_REPLACE_WORDS: &str = r"only|instead";

static NEGATED_ADD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:not|don'?t|do not|never|no)\s+(?:want\s+to\s+|to\s+)?(?:{ADD_WORDS})\w*\b"
    ))
    .expect("negated add pattern must compile")
});

static NEGATED_REPLACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:not|don'?t|do not|never|no)\s+(?:want\s+to\s+|to\s+)?(?:{REPLACE_WORDS})\w*\b"
    ))
    .expect("negated replace pattern must compile")
});

static ADD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{ADD_WORDS})\b|^\s*(?:please\s+)?(?:(?:i|we)\s+)?(?:{SOFT_ADD_WORDS})\b|\balso\s*[.!]?\s*$"
    ))
    .expect("add pattern must compile")
});

static REPLACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:{REPLACE_WORDS}|change\s+(?:them|the options|options|it)\s+to|set\s+(?:them|the options|options)\s+to|new options(?:\s+are)?)\b|^\s*(?:please\s+)?(?:(?:i|we)\s+)?(?:{SOFT_REPLACE_WORDS})\b|\b(?:{SOFT_REPLACE_WORDS})\s*[.!]?\s*$"
    ))
    .expect("replace pattern must compile")
});

static LEADING_FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[:\-]\s*)?(?:(?:them|it|everything|all|the options|options|all options|the current options|the existing options)\s+)?(?:(?:with|by|to|are)\b|:)?\s*(?:the\s+)?(?:(?:following|options?)\b)?\s*[:\-]?\s*",
    )
    .expect("filler pattern must compile")
});

static TRAILING_FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:to|into|in)\s+(?:the\s+|my\s+)?(?:list|options|poll|choices)\s*$|\s+(?:as\s+)?(?:options|too|as well|instead)\s*$")
        .expect("trailing filler pattern must compile")
});

/// Parsed option edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEdit {
    /// `None` for a bare list with no edit verb.
    pub mode: Option<OptionEditMode>,
    pub options: Vec<String>,
    /// For `Clarify`: the mode that was not negated, if any.
    pub remembered: Option<OptionEditMode>,
}

/// Interprets an option edit message.
///
/// Returns `None` when nothing in the message looks like an option edit.
pub fn detect_option_edit(text: &str) -> Option<OptionEdit> {
    let negated_add = NEGATED_ADD.is_match(text);
    let negated_replace = NEGATED_REPLACE.is_match(text);

    let without_negations = NEGATED_REPLACE.replace_all(text, " ");
    let without_negations = NEGATED_ADD.replace_all(&without_negations, " ");
    let wants_add = ADD.is_match(&without_negations);
    let wants_replace = REPLACE.is_match(&without_negations);

    if negated_add || negated_replace {
        let remembered = match (negated_add, negated_replace) {
            (true, false) => Some(OptionEditMode::Replace),
            (false, true) => Some(OptionEditMode::Add),
            _ if wants_add && !wants_replace => Some(OptionEditMode::Add),
            _ if wants_replace && !wants_add => Some(OptionEditMode::Replace),
            _ => None,
        };
        return Some(OptionEdit {
            mode: Some(OptionEditMode::Clarify),
            options: Vec::new(),
            remembered,
        });
    }

    if wants_add && wants_replace {
        return Some(OptionEdit {
            mode: Some(OptionEditMode::Clarify),
            options: Vec::new(),
            remembered: None,
        });
    }

    if wants_add {
        return Some(OptionEdit {
            mode: Some(OptionEditMode::Add),
            options: options_after(&ADD, text),
            remembered: None,
        });
    }

    if wants_replace {
        return Some(OptionEdit {
            mode: Some(OptionEditMode::Replace),
            options: options_after(&REPLACE, text),
            remembered: None,
        });
    }

    let options = parse_option_list(text);
    (!options.is_empty()).then_some(OptionEdit {
        mode: None,
        options,
        remembered: None,
    })
}

/// Options following the edit verb, or preceding it ("X, Y instead").
fn options_after(verb: &Regex, text: &str) -> Vec<String> {
    let Some(found) = verb.find(text) else {
        return parse_option_list(text);
    };
    let after = LEADING_FILLER.replace(&text[found.end()..], "");
    let after = TRAILING_FILLER.replace(&after, "");
    let options = parse_option_list(&after);
    if !options.is_empty() {
        return options;
    }
    let before = TRAILING_FILLER.replace(&text[..found.start()], "");
    parse_option_list(&before)
}
