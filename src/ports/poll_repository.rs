//! Poll persistence port.
//!
//! The conversational core depends only on these operations; relational
//! storage of polls, options and votes lives behind this trait.

use async_trait::async_trait;

use crate::domain::foundation::{OptionId, PollId, UserId};
use crate::domain::poll::{NewPoll, Poll, PollChange, PollOption};

/// Errors from poll persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("poll not found")]
    PollNotFound,

    #[error("option not found")]
    OptionNotFound,

    #[error("user has already voted on this poll")]
    AlreadyVoted,

    #[error("poll is closed")]
    PollClosed,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Port for reading and writing polls.
#[async_trait]
pub trait PollRepository: Send + Sync {
    /// Polls owned by `owner`, newest first.
    async fn fetch_polls_by_owner(&self, owner: &UserId) -> Result<Vec<Poll>, RepositoryError>;

    /// A poll only if `owner` owns it. Foreign polls yield `None`.
    async fn fetch_poll_by_id_and_owner(
        &self,
        poll_id: PollId,
        owner: &UserId,
    ) -> Result<Option<Poll>, RepositoryError>;

    /// Inserts the poll record without options.
    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, RepositoryError>;

    /// Inserts options in the given order.
    async fn insert_options(
        &self,
        poll_id: PollId,
        options: &[String],
    ) -> Result<Vec<PollOption>, RepositoryError>;

    async fn delete_options_by_poll(&self, poll_id: PollId) -> Result<(), RepositoryError>;

    /// Applies one buffered change as a single operation.
    ///
    /// An options change swaps the whole option set.
    async fn update_poll_field(
        &self,
        poll_id: PollId,
        owner: &UserId,
        change: &PollChange,
    ) -> Result<Poll, RepositoryError>;

    /// Removes a poll and its options. Used to compensate a failed creation.
    async fn delete_poll(&self, poll_id: PollId) -> Result<(), RepositoryError>;

    /// Polls open for voting, newest first.
    async fn fetch_active_polls(&self, limit: usize) -> Result<Vec<Poll>, RepositoryError>;

    /// Most recently created polls of any status.
    async fn fetch_recent_polls(&self, limit: usize) -> Result<Vec<Poll>, RepositoryError>;

    async fn fetch_polls_voted_by(&self, user: &UserId) -> Result<Vec<Poll>, RepositoryError>;

    /// A poll by id, only while it is open for voting.
    async fn fetch_active_poll(&self, poll_id: PollId) -> Result<Option<Poll>, RepositoryError>;

    /// Records one vote per user per poll.
    async fn cast_vote(
        &self,
        poll_id: PollId,
        option_id: OptionId,
        user: &UserId,
    ) -> Result<(), RepositoryError>;
}
