//! Poll aggregate as seen by the conversational core.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{OptionId, OwnedByUser, PollId, Timestamp, UserId, ValidationError};

use super::Category;

/// Shortest accepted poll title / topic.
pub const MIN_TITLE_LEN: usize = 5;

/// Longest accepted poll title / topic.
pub const MAX_TITLE_LEN: usize = 200;

/// A poll with its ordered options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub owner_id: UserId,
    pub title: String,
    pub category: Category,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub ends_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Poll {
    /// Option texts in display order.
    pub fn option_texts(&self) -> Vec<String> {
        let mut options: Vec<&PollOption> = self.options.iter().collect();
        options.sort_by_key(|o| o.position);
        options.into_iter().map(|o| o.text.clone()).collect()
    }

    /// Open for voting at `now`.
    pub fn is_open(&self, now: &Timestamp) -> bool {
        self.is_active && self.ends_at.map_or(true, |end| end.is_after(now))
    }

    /// Short listing view.
    pub fn summary(&self) -> PollSummary {
        PollSummary {
            id: self.id,
            title: self.title.clone(),
            category: self.category,
            option_count: self.options.len(),
            is_active: self.is_active,
            ends_at: self.ends_at,
        }
    }
}

impl OwnedByUser for Poll {
    fn owner_id(&self) -> &UserId {
        &self.owner_id
    }
}

/// One selectable answer of a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub poll_id: PollId,
    pub text: String,
    /// Zero-based display position.
    pub position: u32,
    pub votes: u32,
}

/// Data required to insert a poll record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoll {
    pub owner_id: UserId,
    pub title: String,
    pub category: Category,
    pub ends_at: Option<Timestamp>,
}

impl NewPoll {
    /// Builds a validated insert request.
    pub fn new(
        owner_id: UserId,
        title: impl Into<String>,
        category: Category,
        ends_at: Option<Timestamp>,
    ) -> Result<Self, ValidationError> {
        let title = validate_title(&title.into())?;
        Ok(Self {
            owner_id,
            title,
            category,
            ends_at,
        })
    }
}

/// Trims a title and enforces its length bounds.
pub fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::empty_field("title"));
    }
    let len = title.chars().count();
    if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
        return Err(ValidationError::out_of_range(
            "title",
            MIN_TITLE_LEN as i32,
            MAX_TITLE_LEN as i32,
            len as i32,
        ));
    }
    Ok(title.to_string())
}

/// Poll row for list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: PollId,
    pub title: String,
    pub category: Category,
    pub option_count: usize,
    pub is_active: bool,
    pub ends_at: Option<Timestamp>,
}

/// Editable poll attributes, numbered as in the field menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollField {
    Options,
    Title,
    EndDate,
    Category,
}

impl PollField {
    /// All fields in menu order.
    pub fn all() -> [PollField; 4] {
        [
            PollField::Options,
            PollField::Title,
            PollField::EndDate,
            PollField::Category,
        ]
    }

    /// One-based menu number.
    pub fn menu_number(&self) -> usize {
        match self {
            PollField::Options => 1,
            PollField::Title => 2,
            PollField::EndDate => 3,
            PollField::Category => 4,
        }
    }

    /// Field for a one-based menu number.
    pub fn from_menu_number(n: usize) -> Option<Self> {
        Self::all().into_iter().find(|f| f.menu_number() == n)
    }

    /// Stable snake_case key used in entities.
    pub fn key(&self) -> &'static str {
        match self {
            PollField::Options => "options",
            PollField::Title => "title",
            PollField::EndDate => "end_date",
            PollField::Category => "category",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().into_iter().find(|f| f.key() == key)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollField::Options => "options",
            PollField::Title => "title",
            PollField::EndDate => "end date",
            PollField::Category => "category",
        }
    }
}

impl fmt::Display for PollField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A buffered edit waiting for confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PollChange {
    Title(String),
    Options(Vec<String>),
    Category(Category),
    EndDate(Timestamp),
}

impl PollChange {
    pub fn field(&self) -> PollField {
        match self {
            PollChange::Title(_) => PollField::Title,
            PollChange::Options(_) => PollField::Options,
            PollChange::Category(_) => PollField::Category,
            PollChange::EndDate(_) => PollField::EndDate,
        }
    }
}
