//! Clock and sleep abstraction.
//!
//! Every component that needs time or a blocking wait goes through
//! [`TimeSource`], so timing behavior can be simulated deterministically
//! in tests instead of depending on real wall-clock waits.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timebase_common::{Timestamp, TimebaseError, TimebaseResult, NANOS_PER_MICRO};

/// Injectable source of "now" and blocking sleep.
///
/// `sleep` is the single suspension point of the whole subsystem; an
/// interrupted sleep surfaces as the recoverable
/// [`TimebaseError::SleepInterrupted`].
pub trait TimeSource: Send + Sync {
    /// Current time in microseconds since this source's fixed reference.
    ///
    /// Sequential calls within one process read the same reference.
    fn now(&self) -> Timestamp;

    /// Suspend the calling thread for `duration`.
    ///
    /// # Errors
    ///
    /// `SleepInterrupted` (recoverable) when the wait returned early.
    fn sleep(&self, duration: Duration) -> TimebaseResult<()>;
}

/// Wall-clock time source backed by `CLOCK_REALTIME`.
///
/// Returns microseconds since the Unix epoch, matching the embedded
/// controller's expectation. Known limitation: `CLOCK_REALTIME` is not
/// strictly monotonic - an operator stepping the system clock moves it.
/// Consumers of the time base rely on ordering and difference semantics
/// only, and the broadcast protocol tolerates a stepped sample the same
/// way it tolerates a missed one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a system clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Read the clock once, reporting failure as [`TimebaseError::ClockUnavailable`]
    /// instead of panicking.
    ///
    /// Intended as a startup probe: a daemon that cannot read the clock
    /// should refuse to start with a clear error rather than panic on its
    /// first cycle.
    ///
    /// # Errors
    ///
    /// `ClockUnavailable` when `clock_gettime` fails.
    pub fn probe(&self) -> TimebaseResult<Timestamp> {
        read_clock()
    }
}

fn read_clock() -> TimebaseResult<Timestamp> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: clock_gettime writes into the timespec we own.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    if rc != 0 {
        return Err(TimebaseError::ClockUnavailable(
            std::io::Error::last_os_error().to_string(),
        ));
    }
    Ok(Timestamp::from_parts(
        ts.tv_sec as i64,
        ts.tv_nsec as i64 / NANOS_PER_MICRO,
    ))
}

impl TimeSource for SystemClock {
    /// # Panics
    ///
    /// Panics if the OS clock cannot be read. This is deliberate: nothing
    /// in the system can make progress without a time base, so an
    /// unreadable clock is fatal rather than an error to route around.
    /// Use [`SystemClock::probe`] where a fallible read is wanted.
    fn now(&self) -> Timestamp {
        match read_clock() {
            Ok(now) => now,
            Err(e) => panic!("{e}"),
        }
    }

    fn sleep(&self, duration: Duration) -> TimebaseResult<()> {
        if duration.is_zero() {
            return Ok(());
        }

        let request = libc::timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };
        let mut remainder = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // SAFETY: both timespecs are valid for the duration of the call.
        let rc = unsafe { libc::nanosleep(&request, &mut remainder) };
        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            Err(TimebaseError::SleepInterrupted {
                remaining: Duration::new(remainder.tv_sec as u64, remainder.tv_nsec as u32),
            })
        } else {
            Err(TimebaseError::InvalidArgument(format!(
                "nanosleep({duration:?}) failed: {err}"
            )))
        }
    }
}

/// Deterministic time source for tests.
///
/// `now` is a shared atomic microsecond counter and `sleep` advances it
/// instantly, so rate-limiter and broadcaster timing can be verified
/// without real waits. Cloning yields a handle to the same clock.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now_micros: Arc<AtomicI64>,
}

impl SimulatedClock {
    /// Create a simulated clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simulated clock starting at the given instant.
    #[must_use]
    pub fn starting_at(start: Timestamp) -> Self {
        let clock = Self::new();
        clock.set(start);
        clock
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, instant: Timestamp) {
        self.now_micros.store(instant.as_micros(), Ordering::SeqCst);
    }

    /// Advance the clock, as if that much wall time passed.
    pub fn advance(&self, by: Duration) {
        self.now_micros
            .fetch_add(by.as_micros() as i64, Ordering::SeqCst);
    }
}

impl TimeSource for SimulatedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.now_micros.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) -> TimebaseResult<()> {
        self.advance(duration);
        Ok(())
    }
}
