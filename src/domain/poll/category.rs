//! Poll categories and the keyword-family detector.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of poll categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    Politics,
    Entertainment,
    Sports,
    Education,
    Business,
    Health,
    Other,
}

impl Category {
    /// All categories in menu order.
    pub fn all() -> [Category; 8] {
        [
            Category::Technology,
            Category::Politics,
            Category::Entertainment,
            Category::Sports,
            Category::Education,
            Category::Business,
            Category::Health,
            Category::Other,
        ]
    }

    /// One-based menu number.
    pub fn menu_number(&self) -> usize {
        Self::all()
            .iter()
            .position(|c| c == self)
            .map_or(0, |i| i + 1)
    }

    /// Category for a one-based menu number.
    pub fn from_menu_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::all().get(i).copied())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Politics => "Politics",
            Category::Entertainment => "Entertainment",
            Category::Sports => "Sports",
            Category::Education => "Education",
            Category::Business => "Business",
            Category::Health => "Health",
            Category::Other => "Other",
        }
    }

    /// Lowercase storage value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Politics => "politics",
            Category::Entertainment => "entertainment",
            Category::Sports => "sports",
            Category::Education => "education",
            Category::Business => "business",
            Category::Health => "health",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string names no category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

struct KeywordFamily {
    category: Category,
    pattern: Regex,
}

fn family(category: Category, pattern: &str) -> KeywordFamily {
    KeywordFamily {
        category,
        pattern: Regex::new(pattern).expect("category pattern must compile"),
    }
}

static FAMILIES: Lazy<Vec<KeywordFamily>> = Lazy::new(|| {
    vec![
        family(
            Category::Technology,
            r"(?i)\b(tech|technology|programming|programmer|language|languages|software|code|coding|developer|computer|computers|ai|app|apps|framework|javascript|python|rust|gadget|gadgets|smartphone|phone|internet|cloud|database|editor|ide|linux)\b",
        ),
        family(
            Category::Politics,
            r"(?i)\b(politics|political|election|elections|vote|voting|government|president|minister|parliament|policy|policies|party|parties|senate|congress|democracy|law|laws)\b",
        ),
        family(
            Category::Entertainment,
            r"(?i)\b(movie|movies|film|films|music|song|songs|band|tv|show|shows|series|netflix|celebrity|actor|actress|game|games|gaming|anime|book|books|album)\b",
        ),
        family(
            Category::Sports,
            r"(?i)\b(sport|sports|football|soccer|cricket|basketball|tennis|team|teams|player|players|match|league|olympics|athlete|champion|championship|cup)\b",
        ),
        family(
            Category::Education,
            r"(?i)\b(education|school|schools|college|university|student|students|teacher|teachers|course|courses|exam|exams|learning|study|studying|class|classes)\b",
        ),
        family(
            Category::Business,
            r"(?i)\b(business|company|companies|startup|startups|market|marketing|finance|money|investment|investing|stock|stocks|economy|job|jobs|career|office|brand|brands)\b",
        ),
        family(
            Category::Health,
            r"(?i)\b(health|healthy|fitness|exercise|workout|diet|food|nutrition|doctor|hospital|medicine|mental|sleep|yoga|wellness)\b",
        ),
    ]
});

/// Maps free text to a category by counting keyword hits per family.
///
/// The family with the most hits wins; earlier families win ties.
/// Returns `None` when no family matches so the caller can fall back.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryDetector;

impl CategoryDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, text: &str) -> Option<Category> {
        if let Some(named) = Self::explicit_name(text) {
            return Some(named);
        }

        let mut best: Option<(Category, usize)> = None;
        for family in FAMILIES.iter() {
            let hits = family.pattern.find_iter(text).count();
            if hits == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| hits > top) {
                best = Some((family.category, hits));
            }
        }
        best.map(|(category, _)| category)
    }

    /// Whole-message category name or menu number ("2", "sports").
    pub fn parse_choice(&self, text: &str) -> Option<Category> {
        let trimmed = text.trim().trim_end_matches('.');
        if let Ok(n) = trimmed.parse::<usize>() {
            return Category::from_menu_number(n);
        }
        trimmed.parse().ok()
    }

    fn explicit_name(text: &str) -> Option<Category> {
        let trimmed = text.trim().trim_end_matches('.');
        trimmed.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programming_language_is_technology() {
        let detector = CategoryDetector::new();
        assert_eq!(
            detector.detect("best programming language"),
            Some(Category::Technology)
        );
    }

    #[test]
    fn families_use_word_boundaries() {
        let detector = CategoryDetector::new();
        // "paint" must not hit "ai", "cupboard" must not hit "cup".
        assert_eq!(detector.detect("paint colour for the cupboard"), None);
    }

    #[test]
    fn most_hits_win() {
        let detector = CategoryDetector::new();
        assert_eq!(
            detector.detect("which football team and player won the league"),
            Some(Category::Sports)
        );
    }

    #[test]
    fn unknown_text_yields_none() {
        assert_eq!(CategoryDetector::new().detect("what colour is the sky"), None);
    }

    #[test]
    fn explicit_category_name_is_taken_as_is() {
        assert_eq!(CategoryDetector::new().detect("Other"), Some(Category::Other));
    }

    #[test]
    fn parse_choice_accepts_number_or_name() {
        let detector = CategoryDetector::new();
        assert_eq!(detector.parse_choice("4"), Some(Category::Sports));
        assert_eq!(detector.parse_choice("health"), Some(Category::Health));
        assert_eq!(detector.parse_choice("9"), None);
        assert_eq!(detector.parse_choice("0"), None);
    }

    #[test]
    fn menu_numbers_round_trip() {
        for category in Category::all() {
            assert_eq!(Category::from_menu_number(category.menu_number()), Some(category));
        }
    }
}
