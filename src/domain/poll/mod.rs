//! Poll domain - the records the assistant creates, edits and lists.

mod category;
mod options;
#[allow(clippy::module_inception)]
mod poll;
mod suggestions;

pub use category::{Category, CategoryDetector, UnknownCategory};
pub use options::{
    find_duplicates, is_index_selection, merge_unique, parse_index_selection, parse_option_list,
    validate_options, OptionListError, MAX_OPTIONS, MAX_OPTION_LEN, MIN_OPTIONS,
};
pub use poll::{
    validate_title, NewPoll, Poll, PollChange, PollField, PollOption, PollSummary, MAX_TITLE_LEN,
    MIN_TITLE_LEN,
};
pub use suggestions::{
    fallback_options, fallback_topics, parse_suggestions, MAX_SUGGESTIONS, MIN_SUGGESTIONS,
};
