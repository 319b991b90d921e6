//! Option list parsing, validation and merging.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Fewest options a poll may carry.
pub const MIN_OPTIONS: usize = 2;

/// Most options a poll may carry.
pub const MAX_OPTIONS: usize = 10;

/// Longest accepted single option.
pub const MAX_OPTION_LEN: usize = 100;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,*\n;]").expect("separator pattern must compile"));

static CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:and|or|&)\s+").expect("conjunction pattern must compile"));

static BULLET_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-•]+|\d{1,2}[.)]|and\s+|or\s+)\s*").expect("bullet pattern must compile")
});

static SELECTION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("selection pattern must compile"));

static SELECTION_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:options?\s+)?\d+(?:\s*(?:,|and|&|\s)\s*\d+)*\s*$")
        .expect("selection shape pattern must compile")
});

/// Why a candidate option list was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionListError {
    #[error("at least {MIN_OPTIONS} options are required, got {found}")]
    TooFew { found: usize },

    #[error("at most {MAX_OPTIONS} options are allowed, got {found}")]
    TooMany { found: usize },

    #[error("duplicate options: {}", .0.join(", "))]
    Duplicates(Vec<String>),

    #[error("option '{0}' is too long")]
    TooLong(String),
}

/// Splits free text into option candidates.
///
/// Accepts comma, asterisk, semicolon and newline separated lists, strips
/// bullets and numbering, and drops empty fragments. A conjunction only
/// separates items in the last fragment ("A, B and C") or in a list with
/// no other separator ("A and B").
pub fn parse_option_list(text: &str) -> Vec<String> {
    let mut fragments: Vec<String> = SEPARATORS
        .split(text)
        .map(clean_option)
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(last) = fragments.pop() {
        fragments.extend(
            CONJUNCTION
                .split(&last)
                .map(clean_option)
                .filter(|s| !s.is_empty()),
        );
    }
    fragments
}

fn clean_option(raw: &str) -> String {
    let stripped = BULLET_PREFIX.replace(raw, "");
    stripped
        .trim()
        .trim_end_matches(['.', '!'])
        .trim_matches(['"', '\''])
        .trim()
        .to_string()
}

/// Entries that repeat an earlier one, compared case-insensitively.
pub fn find_duplicates(options: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for option in options {
        if !seen.insert(option.to_lowercase()) {
            duplicates.push(option.clone());
        }
    }
    duplicates
}

/// Checks a complete option set: size bounds, lengths and uniqueness.
pub fn validate_options(options: &[String]) -> Result<(), OptionListError> {
    let duplicates = find_duplicates(options);
    if !duplicates.is_empty() {
        return Err(OptionListError::Duplicates(duplicates));
    }
    if let Some(long) = options.iter().find(|o| o.chars().count() > MAX_OPTION_LEN) {
        return Err(OptionListError::TooLong(long.clone()));
    }
    if options.len() < MIN_OPTIONS {
        return Err(OptionListError::TooFew {
            found: options.len(),
        });
    }
    if options.len() > MAX_OPTIONS {
        return Err(OptionListError::TooMany {
            found: options.len(),
        });
    }
    Ok(())
}

/// Appends `additions` to `existing`, keeping the first spelling seen.
pub fn merge_unique(existing: &[String], additions: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(additions.iter())
        .filter(|o| seen.insert(o.to_lowercase()))
        .cloned()
        .collect()
}

/// True when the text is only a list of numbers ("1, 3", "2 and 4").
pub fn is_index_selection(text: &str) -> bool {
    SELECTION_ONLY.is_match(text)
}

/// Resolves "1, 3" or "all" into zero-based indices below `count`.
///
/// Returns `None` when nothing valid was selected or a number is out of range.
pub fn parse_index_selection(text: &str, count: usize) -> Option<Vec<usize>> {
    let lower = text.trim().to_lowercase();
    if matches!(lower.as_str(), "all" | "all of them" | "use all" | "all of those") {
        return (count > 0).then(|| (0..count).collect());
    }
    if !is_index_selection(&lower) {
        return None;
    }

    let mut picked = Vec::new();
    for token in SELECTION_TOKEN.find_iter(&lower) {
        let n: usize = token.as_str().parse().ok()?;
        if n == 0 || n > count {
            return None;
        }
        if !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }
    (!picked.is_empty()).then_some(picked)
}
