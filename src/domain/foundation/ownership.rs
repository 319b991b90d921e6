//! Ownership trait for user-owned resources.
//!
//! Polls belong to the admin that created them. Ownership failures are
//! reported as `PollNotFound` so a caller probing foreign ids learns nothing
//! about whether the poll exists.
//!
//! # Example
//!
//! ```ignore
//! impl OwnedByUser for Poll {
//!     fn owner_id(&self) -> &UserId {
//!         &self.owner_id
//!     }
//! }
//!
//! poll.check_ownership(&user_id)?; // Err(PollNotFound) if not owner
//! ```

use super::{DomainError, ErrorCode, UserId};

/// Trait for aggregates that have a single owner.
pub trait OwnedByUser {
    /// Returns the ID of the user who owns this resource.
    fn owner_id(&self) -> &UserId;

    /// Checks if the given user is the owner.
    fn is_owner(&self, user_id: &UserId) -> bool {
        self.owner_id() == user_id
    }

    /// Validates ownership, returning a not-found error if the user is not the owner.
    ///
    /// The error carries no details about the real owner.
    fn check_ownership(&self, user_id: &UserId) -> Result<(), DomainError> {
        if self.is_owner(user_id) {
            Ok(())
        } else {
            Err(DomainError::new(ErrorCode::PollNotFound, "Poll not found"))
        }
    }
}
