use std::time::Duration;
use thiserror::Error;

/// Time-base error types covering precondition violations, recoverable
/// timing hiccups, and collaborator failures.
///
/// The taxonomy is deliberate: `ClockUnavailable` is fatal (nothing can
/// make progress without a time base), `InvalidArgument` is a caller bug
/// rejected immediately, everything else is transient and loops are
/// expected to continue to their next cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimebaseError {
    /// The OS time source could not be read. Fatal.
    #[error("OS clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A precondition violation: negative durations, non-positive rates.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking sleep returned early (e.g. interrupted by a signal).
    /// Recoverable: at worst one iteration runs early.
    #[error("sleep interrupted with {remaining:?} remaining")]
    SleepInterrupted {
        /// Portion of the requested sleep that was not slept.
        remaining: Duration,
    },

    /// A publish attempt on the message bus failed. Recoverable: the
    /// broadcaster must still attempt its next cycle.
    #[error("publish on channel '{channel}' failed: {reason}")]
    PublishFailed {
        /// Channel the sample was destined for.
        channel: String,
        /// Transport-reported reason.
        reason: String,
    },

    /// Serial device configuration failure.
    #[error("serial device error: {0}")]
    Serial(String),

    /// Invalid lifecycle transition attempted on a periodic loop.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for time-base operations.
pub type TimebaseResult<T> = Result<T, TimebaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimebaseError::PublishFailed {
            channel: "MBOT_TIMESYNC".into(),
            reason: "transport down".into(),
        };
        assert_eq!(
            err.to_string(),
            "publish on channel 'MBOT_TIMESYNC' failed: transport down"
        );
    }

    #[test]
    fn test_interrupted_carries_remainder() {
        let err = TimebaseError::SleepInterrupted {
            remaining: Duration::from_millis(7),
        };
        match err {
            TimebaseError::SleepInterrupted { remaining } => {
                assert_eq!(remaining, Duration::from_millis(7));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
