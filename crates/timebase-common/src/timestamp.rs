//! Microsecond-resolution timestamps and duration arithmetic.
//!
//! [`Timestamp`] is the single time currency of the subsystem: a signed
//! 64-bit count of microseconds since a fixed, implementation-defined
//! reference instant. Consumers must rely only on ordering and difference
//! semantics, never on calendar meaning - the reference instant is owned
//! by whichever clock produced the value.

use crate::error::{TimebaseError, TimebaseResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Microseconds per second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Microseconds per millisecond.
pub const MICROS_PER_MILLI: i64 = 1_000;

/// Nanoseconds per microsecond.
pub const NANOS_PER_MICRO: i64 = 1_000;

/// A point in time, counted in microseconds from a fixed reference instant.
///
/// Signed 64 bits give a ±292,000-year range before overflow, so ordinary
/// arithmetic on two timestamps from the same clock never wraps. The
/// explicit arithmetic methods are still checked: an overflow is reported
/// instead of silently wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

// The wire encoding of a time-sync sample is exactly this value, so the
// layout must stay a bare i64.
static_assertions::assert_eq_size!(Timestamp, i64);

impl Timestamp {
    /// The zero timestamp ("never", for rate-limiter warm-up state).
    pub const ZERO: Timestamp = Timestamp(0);

    /// Construct from a raw microsecond count.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Construct from split (seconds, sub-second microseconds) parts.
    ///
    /// This is the inverse of [`Timestamp::split`] for any `micros` in
    /// `[0, 1_000_000)`; other values are accepted and simply summed.
    #[must_use]
    pub const fn from_parts(seconds: i64, micros: i64) -> Self {
        Self(seconds * MICROS_PER_SEC + micros)
    }

    /// Raw microsecond count.
    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Decompose into whole seconds and a non-negative sub-second part.
    ///
    /// Uses floor division, so the invariant `micros in [0, 1_000_000)`
    /// holds for negative timestamps too: `-1 µs` splits into
    /// `(-1 s, 999_999 µs)`.
    #[must_use]
    pub const fn split(self) -> SplitTime {
        SplitTime {
            seconds: self.0.div_euclid(MICROS_PER_SEC),
            micros: self.0.rem_euclid(MICROS_PER_SEC),
        }
    }

    /// Add a non-negative number of milliseconds.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `ms` is negative (never silently negated) or
    /// if the addition would overflow the 64-bit microsecond range.
    pub fn add_millis(self, ms: i64) -> TimebaseResult<Timestamp> {
        if ms < 0 {
            return Err(TimebaseError::InvalidArgument(format!(
                "millisecond offset must be non-negative, got {ms}"
            )));
        }
        ms.checked_mul(MICROS_PER_MILLI)
            .and_then(|us| self.0.checked_add(us))
            .map(Timestamp)
            .ok_or_else(|| {
                TimebaseError::InvalidArgument(format!(
                    "adding {ms} ms to {} µs overflows the timestamp range",
                    self.0
                ))
            })
    }

    /// Add a non-negative number of microseconds.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `us` is negative or the addition overflows.
    pub fn add_micros(self, us: i64) -> TimebaseResult<Timestamp> {
        if us < 0 {
            return Err(TimebaseError::InvalidArgument(format!(
                "microsecond offset must be non-negative, got {us}"
            )));
        }
        self.0.checked_add(us).map(Timestamp).ok_or_else(|| {
            TimebaseError::InvalidArgument(format!(
                "adding {us} µs to {} µs overflows the timestamp range",
                self.0
            ))
        })
    }

    /// Signed difference `self - other` in microseconds.
    ///
    /// Negative means `self` is earlier than `other`.
    #[must_use]
    pub const fn diff(self, other: Timestamp) -> i64 {
        self.0 - other.0
    }

    /// Convert to whole milliseconds, truncating toward zero.
    ///
    /// Only meaningful for short-horizon intervals (scheduling deadlines,
    /// loop periods). For absolute timestamps the millisecond count can
    /// exceed what downstream 32-bit consumers expect; do not feed those
    /// through here.
    #[must_use]
    pub const fn as_millis_interval(self) -> i64 {
        self.0 / MICROS_PER_MILLI
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.split();
        write!(f, "{}.{:06}s", parts.seconds, parts.micros)
    }
}

/// A timestamp decomposed into seconds and sub-second microseconds.
///
/// `micros` is always in `[0, 1_000_000)`. Not interchangeable with
/// [`SplitNanos`]; convert explicitly via [`SplitTime::to_nanos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTime {
    /// Whole seconds (floor).
    pub seconds: i64,
    /// Sub-second microseconds, `[0, 1_000_000)`.
    pub micros: i64,
}

impl SplitTime {
    /// Convert the sub-second part to nanoseconds, for interoperating with
    /// nanosecond-based time structures.
    #[must_use]
    pub const fn to_nanos(self) -> SplitNanos {
        SplitNanos {
            seconds: self.seconds,
            nanos: self.micros * NANOS_PER_MICRO,
        }
    }

    /// Reassemble the original timestamp.
    #[must_use]
    pub const fn to_timestamp(self) -> Timestamp {
        Timestamp::from_parts(self.seconds, self.micros)
    }
}

/// A timestamp decomposed into seconds and sub-second nanoseconds.
///
/// `nanos` is always in `[0, 1_000_000_000)` when produced by
/// [`SplitTime::to_nanos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitNanos {
    /// Whole seconds (floor).
    pub seconds: i64,
    /// Sub-second nanoseconds, `[0, 1_000_000_000)`.
    pub nanos: i64,
}
