//! Deterministic suggestions and parsing of generated suggestion lists.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Category, MAX_OPTIONS, MAX_OPTION_LEN};

/// Fewest suggestions worth showing.
pub const MIN_SUGGESTIONS: usize = 3;

/// Most suggestions shown at once.
pub const MAX_SUGGESTIONS: usize = 5;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]+|\d{1,2}[.):])\s*").expect("list marker pattern must compile")
});

/// Topic ideas used when the backend cannot be asked.
pub fn fallback_topics(category: Category) -> Vec<String> {
    let topics: &[&str] = match category {
        Category::Technology => &[
            "Which programming language should every developer learn first?",
            "Which AI tool do you use most at work?",
            "Do you prefer a laptop or a desktop for daily work?",
            "Which mobile operating system do you use?",
        ],
        Category::Politics => &[
            "Which issue matters most to you in the next election?",
            "Should voting be mandatory?",
            "How often do you follow political news?",
        ],
        Category::Entertainment => &[
            "What is the best movie genre?",
            "Which streaming service do you use most?",
            "What kind of music do you listen to while working?",
        ],
        Category::Sports => &[
            "Which sport is the most exciting to watch?",
            "Who will win the next world cup?",
            "How often do you play sports each week?",
        ],
        Category::Education => &[
            "Do you prefer online or in-person classes?",
            "Which subject should schools teach more of?",
            "How do you learn new skills best?",
        ],
        Category::Business => &[
            "Do you prefer remote, hybrid or office work?",
            "Which meeting length is the most productive?",
            "What matters most when choosing an employer?",
        ],
        Category::Health => &[
            "How many hours do you sleep on a typical night?",
            "What is your favourite way to exercise?",
            "Which healthy habit is hardest to keep?",
        ],
        Category::Other => &[
            "What is the best pizza topping?",
            "Coffee or tea?",
            "Which season do you like most?",
        ],
    };
    topics.iter().map(|t| t.to_string()).collect()
}

/// Generic answer options for when the backend cannot be asked.
pub fn fallback_options(topic: &str) -> Vec<String> {
    let lower = topic.to_lowercase();
    let options: &[&str] = if lower.starts_with("do you")
        || lower.starts_with("should")
        || lower.starts_with("is ")
        || lower.starts_with("are ")
        || lower.starts_with("will ")
    {
        &["Yes", "No", "Not sure"]
    } else if lower.starts_with("how often") {
        &["Daily", "Weekly", "Monthly", "Rarely", "Never"]
    } else {
        &[
            "Strongly agree",
            "Agree",
            "Neutral",
            "Disagree",
            "Strongly disagree",
        ]
    };
    options.iter().map(|o| o.to_string()).collect()
}

/// Extracts list items from generated text: one item per line, list
/// markers and quotes stripped, duplicates and overlong lines dropped.
///
/// Returns at most `limit` items.
pub fn parse_suggestions(text: &str, limit: usize) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in text.lines() {
        let item = LIST_MARKER.replace(line, "");
        let item = item.trim().trim_matches(['"', '\'', '`']).trim();
        if item.is_empty() || item.ends_with(':') || item.chars().count() > MAX_OPTION_LEN * 2 {
            continue;
        }
        if items.iter().any(|seen| seen.eq_ignore_ascii_case(item)) {
            continue;
        }
        items.push(item.to_string());
        if items.len() == limit.min(MAX_OPTIONS) {
            break;
        }
    }
    items
}
