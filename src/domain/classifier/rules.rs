//! Ordered global intent rules.
//!
//! Each rule pairs a pattern with the intent it produces and a confidence.
//! Rules are evaluated in order; the first match at or above the confidence
//! threshold wins. New intents are added as new entries.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::conversation::IntentType;

/// One `(predicate, intent, confidence)` entry.
pub struct IntentRule {
    pub kind: IntentType,
    pub confidence: f32,
    pattern: Regex,
    max_words: Option<usize>,
    /// Only meaningful after an earlier intent gave it something to refer to.
    requires_anchor: bool,
}

impl IntentRule {
    fn new(kind: IntentType, confidence: f32, pattern: &str) -> Self {
        Self {
            kind,
            confidence,
            pattern: Regex::new(pattern).expect("intent rule pattern must compile"),
            max_words: None,
            requires_anchor: false,
        }
    }

    fn max_words(mut self, n: usize) -> Self {
        self.max_words = Some(n);
        self
    }

    fn anchored(mut self) -> Self {
        self.requires_anchor = true;
        self
    }

    pub fn requires_anchor(&self) -> bool {
        self.requires_anchor
    }

    /// Whether the rule's predicate holds for `text`.
    pub fn matches(&self, text: &str) -> bool {
        if let Some(max) = self.max_words {
            if text.split_whitespace().count() > max {
                return false;
            }
        }
        self.pattern.is_match(text)
    }
}

impl std::fmt::Debug for IntentRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentRule")
            .field("kind", &self.kind)
            .field("confidence", &self.confidence)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Longest message that still reads as a command while a step expects text.
const MAX_SWITCH_WORDS: usize = 6;

static SWITCH_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:please\s+|can\s+you\s+|could\s+you\s+|i\s+want\s+to\s+|i'?d\s+like\s+to\s+|let'?s\s+|let\s+me\s+)?(?:show|list|see|view|display|browse|create|make|start|update|edit|change|modify|vote)\b",
    )
    .expect("switch command pattern must compile")
});

/// Whether `text` is a short imperative like "show my polls" rather than an
/// answer that merely mentions polls ("Should we run a new survey?").
pub fn is_switch_command(text: &str) -> bool {
    let text = text.trim();
    !text.ends_with('?')
        && text.split_whitespace().count() <= MAX_SWITCH_WORDS
        && SWITCH_COMMAND.is_match(text)
}

/// Default rule list: update, create, vote, list-voted, list-mine,
/// list-recent, list, greeting, help, confirmation, numeric selection.
pub static DEFAULT_RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    vec![
        IntentRule::new(
            IntentType::UpdatePoll,
            0.9,
            r"(?i)\b(update|edit|modify|change|rename|extend)\b.*\b(poll|polls|survey)\b",
        ),
        IntentRule::new(
            IntentType::CreatePoll,
            0.9,
            r"(?i)\b(create|make|start|new|build|set up|setup|launch|run)\b.*\b(poll|survey)\b",
        ),
        IntentRule::new(
            IntentType::Vote,
            0.9,
            r"(?i)^(?:i\s+want\s+to\s+|i'?d\s+like\s+to\s+|let\s+me\s+|can\s+i\s+|please\s+)?(?:vote|cast\s+(?:a|my)\s+vote)\b",
        ),
        IntentRule::new(
            IntentType::ListVotedPolls,
            0.9,
            r"(?i)\bpolls?\b.*\b(?:i|i've|i have)\s+(?:voted|participated)\b|\bmy votes\b|\bvoted (?:on|in)\b",
        ),
        IntentRule::new(
            IntentType::ListMyPolls,
            0.9,
            r"(?i)\b(?:my|mine)\s+(?:own\s+)?polls?\b|\bpolls?\b.*\b(?:i|i've|i have)\s+(?:created|made)\b",
        ),
        IntentRule::new(
            IntentType::ListRecentPolls,
            0.85,
            r"(?i)\b(?:recent|latest|newest|last)\b.*\bpolls?\b",
        ),
        IntentRule::new(
            IntentType::ListPolls,
            0.85,
            r"(?i)\b(?:show|list|see|view|display|browse|find|get)\b.*\bpolls?\b|\b(?:active|open|all|current)\s+polls\b|^polls\??$",
        ),
        IntentRule::new(
            IntentType::Greeting,
            0.9,
            r"(?i)^(?:hi|hello|hey|hiya|howdy|greetings|good (?:morning|afternoon|evening))\b",
        )
        .max_words(5),
        IntentRule::new(
            IntentType::Help,
            0.85,
            r"(?i)\b(?:what can you do|how does this work|what do you do|what are my options|how do i use)\b",
        ),
        IntentRule::new(IntentType::NumericSelection, 0.9, r"^\s*#?\d{1,3}\s*$").anchored(),
    ]
});
