//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `poll` - Polls, categories and option list rules
//! - `conversation` - Messages, intents, flow state and results
//! - `classifier` - Pattern intent classifier and its recognizers

pub mod classifier;
pub mod conversation;
pub mod foundation;
pub mod poll;
