//! Lifecycle state for periodic loops.
//!
//! A broadcaster (or any other periodic task built on the time base) has
//! exactly one terminal transition: shutdown. The state machine exists so
//! that misuse - running a loop twice, running after stop - is rejected
//! instead of silently looping.

use crate::error::{TimebaseError, TimebaseResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States in a periodic loop's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    /// Constructed, not yet running.
    #[default]
    Idle,
    /// Cyclic operation in progress.
    Running,
    /// Terminal: the loop has exited and cannot be restarted.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl LoopState {
    /// Check whether a transition to `target` is valid from this state.
    #[must_use]
    pub fn can_transition_to(&self, target: LoopState) -> bool {
        use LoopState::{Idle, Running, Stopped};

        matches!(
            (self, target),
            (Idle, Running)
                | (Running, Stopped)
                // Shutdown requested before the loop ever started
                | (Idle, Stopped)
        )
    }

    /// Attempt to transition to `target`.
    pub fn transition_to(&mut self, target: LoopState) -> TimebaseResult<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(TimebaseError::InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }
}
