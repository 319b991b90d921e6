//! State machine trait for flow step enums.
//!
//! Each multi-turn flow declares its steps as an enum and the edges between
//! them here, so a controller cannot move a conversation to a step the flow
//! does not allow.

use super::{DomainError, ErrorCode};

/// Trait for step enums that form a finite state machine.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for CreationStep {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Category, Topic) | (Topic, Options) | ...)
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> { ... }
/// }
///
/// let next = step.transition_to(CreationStep::Topic)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if moving from self to target is allowed.
    ///
    /// Staying on the same step is always allowed (re-prompts).
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns every step reachable in one move from the current one.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs the move, returning an error for an undeclared edge.
    fn transition_to(&self, target: Self) -> Result<Self, DomainError> {
        if self == &target || self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot move from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if the current step ends the flow.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
