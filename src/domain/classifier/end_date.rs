//! End date expressions: `YYYY-MM-DD`, "in N days/weeks", "extend".

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::foundation::Timestamp;

/// Days added when the user asks for an extension without a date.
pub const DEFAULT_EXTENSION_DAYS: i64 = 7;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("date pattern must compile")
});

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:in|by|for|another|extra|additional)?\s*(\d{1,3})\s+(?:more\s+)?(day|days|week|weeks|month|months)\b")
        .expect("relative date pattern must compile")
});

static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(tomorrow|next week|next month)\b").expect("named date pattern must compile")
});

static EXTEND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(extend|extension|longer|more time|keep it open|push (?:it )?back)\b")
        .expect("extend pattern must compile")
});

/// A resolved end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndDateRequest {
    pub at: Timestamp,
    /// No date was given and the default extension was applied.
    pub defaulted: bool,
}

/// Resolves an end date expression relative to `now`.
pub fn parse_end_date(text: &str, now: Timestamp) -> Option<EndDateRequest> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Timestamp::end_of_day(date).map(|at| EndDateRequest {
            at,
            defaulted: false,
        });
    }

    if let Some(caps) = RELATIVE.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        let days = match &caps[2].to_lowercase()[..] {
            "week" | "weeks" => n * 7,
            "month" | "months" => n * 30,
            _ => n,
        };
        return Some(EndDateRequest {
            at: now.plus_days(days),
            defaulted: false,
        });
    }

    if let Some(caps) = NAMED.captures(text) {
        let days = match &caps[1].to_lowercase()[..] {
            "tomorrow" => 1,
            "next week" => 7,
            _ => 30,
        };
        return Some(EndDateRequest {
            at: now.plus_days(days),
            defaulted: false,
        });
    }

    EXTEND.is_match(text).then(|| EndDateRequest {
        at: now.plus_days(DEFAULT_EXTENSION_DAYS),
        defaulted: true,
    })
}
