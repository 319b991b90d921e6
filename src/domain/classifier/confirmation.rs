//! Affirm / decline / edit recognition for confirmation steps.

use once_cell::sync::Lazy;
use regex::Regex;

use super::reset::normalize;

/// A decision at a confirmation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Affirm,
    Decline,
    Edit,
}

static HEDGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(not sure|maybe|perhaps|i guess|don'?t know|do not know|dunno|unsure|let me think|hmm+|possibly)\b")
        .expect("hedge pattern must compile")
});

static EDIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(edit|modify|change|go back|redo|make changes|revise|fix)\b")
        .expect("edit pattern must compile")
});

static DECLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(no|nope|nah|n|don'?t|do not|discard|scrap( it)?|abort|not now|no thanks|throw it away)\b")
        .expect("decline pattern must compile")
});

static AFFIRM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(yes|yeah|yep|yup|ya|y|sure|ok|okay|k|confirm|confirmed|correct|looks good|sounds good|go ahead|do it|publish( it)?|create it|save( it)?|apply( it)?|perfect|great|absolutely|definitely|lgtm|that'?s right|right|good|fine|approved?)\b",
    )
    .expect("affirm pattern must compile")
});

/// Recognizes a decision. Checks edit, then decline, then affirm.
///
/// Hedged replies ("maybe", "not sure") produce no decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationRecognizer;

impl ConfirmationRecognizer {
    pub fn new() -> Self {
        Self
    }

    pub fn recognize(&self, text: &str) -> Option<Confirmation> {
        let normalized = normalize(text);
        if normalized.is_empty() || HEDGE.is_match(&normalized) {
            return None;
        }
        if EDIT.is_match(&normalized) {
            return Some(Confirmation::Edit);
        }
        if DECLINE.is_match(&normalized) {
            return Some(Confirmation::Decline);
        }
        if AFFIRM.is_match(&normalized) {
            return Some(Confirmation::Affirm);
        }
        None
    }
}
