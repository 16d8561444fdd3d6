//! Rate limiter for periodic loops.
//!
//! Holds a caller to an approximately constant wall-clock period even
//! though the work per iteration takes variable time: each call sleeps
//! only for whatever is left of the period budget.
//!
//! State is owned, one instance per periodic loop. Two loops sharing one
//! limiter would corrupt each other's elapsed-time baseline, so there is
//! no global instance anywhere - if you have two loops, make two.

use crate::clock::TimeSource;
use std::time::Duration;
use timebase_common::{TimebaseError, TimebaseResult, Timestamp, MICROS_PER_SEC};
use tracing::{debug, warn};

/// Per-loop pacing state.
///
/// `last_time` starts at zero ("never run"), which makes the first call a
/// warm-up cycle: its elapsed time spans from the clock's epoch, so it
/// does not sleep and its measured period is meaningless. Tests and
/// metrics consumers should discard cycle 1.
#[derive(Debug)]
pub struct RateLimiter {
    /// End of the previously completed cycle.
    last_time: Timestamp,
    /// Completed cycles, including the warm-up cycle.
    cycle_count: u64,
    /// Cycles whose body overran the period budget.
    overrun_count: u64,
}

/// Result of a single pacing call.
#[derive(Debug, Clone, Copy)]
pub struct PaceReport {
    /// Sleep requested for this cycle (zero when the body overran).
    pub requested_sleep: Duration,
    /// The loop body exceeded the period budget; no sleep occurred and no
    /// catch-up is attempted.
    pub overrun: bool,
    /// The sleep returned early; this iteration runs early, which is
    /// harmless.
    pub interrupted: bool,
    /// Cycle number of this call, 1-based. Cycle 1 is the warm-up cycle.
    pub cycle: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create pacing state for one periodic loop.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_time: Timestamp::ZERO,
            cycle_count: 0,
            overrun_count: 0,
        }
    }

    /// End of the previously completed cycle (zero before the first call).
    #[must_use]
    pub fn last_time(&self) -> Timestamp {
        self.last_time
    }

    /// Number of cycles whose body overran the period budget.
    ///
    /// A consistently climbing count means the loop is slower than its
    /// target rate; the limiter clamps rather than compounds, so this
    /// counter is the only place sustained overrun is visible.
    #[must_use]
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Sleep just long enough to hold the loop at `hz` iterations/second.
    ///
    /// Computes the remaining period budget from the end of the previous
    /// cycle, sleeps for it (clamped at zero - an overrunning body is not
    /// "caught up" with a negative sleep), then re-stamps `last_time`
    /// *after* the sleep so sleep imprecision is absorbed by the next
    /// cycle instead of compounding.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `hz` is not finite and positive. An
    /// interrupted sleep is reported in the returned [`PaceReport`], not
    /// as an error: skipping one sleep only makes one iteration early.
    pub fn sleep_hz<C: TimeSource + ?Sized>(
        &mut self,
        clock: &C,
        hz: f64,
    ) -> TimebaseResult<PaceReport> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(TimebaseError::InvalidArgument(format!(
                "rate must be positive and finite, got {hz} Hz"
            )));
        }

        let max_delay = (MICROS_PER_SEC as f64 / hz).round() as i64;
        let elapsed = clock.now().diff(self.last_time);
        let delay = (max_delay - elapsed).max(0);

        let overrun = self.cycle_count > 0 && elapsed > max_delay;
        if overrun {
            self.overrun_count += 1;
            warn!(
                cycle = self.cycle_count + 1,
                elapsed_us = elapsed,
                budget_us = max_delay,
                "Loop body overran the period budget; not sleeping"
            );
        }

        let mut interrupted = false;
        if delay > 0 {
            match clock.sleep(Duration::from_micros(delay as u64)) {
                Ok(()) => {}
                Err(TimebaseError::SleepInterrupted { remaining }) => {
                    interrupted = true;
                    debug!(?remaining, "Pacing sleep interrupted; continuing early");
                }
                Err(e) => return Err(e),
            }
        }

        self.last_time = clock.now();
        self.cycle_count += 1;

        Ok(PaceReport {
            requested_sleep: Duration::from_micros(delay as u64),
            overrun,
            interrupted,
            cycle: self.cycle_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;

    #[test]
    fn test_rejects_bad_rates() {
        let clock = SimulatedClock::new();
        let mut pacer = RateLimiter::new();

        for hz in [0.0, -10.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(
                    pacer.sleep_hz(&clock, hz),
                    Err(TimebaseError::InvalidArgument(_))
                ),
                "expected rejection for hz = {hz}"
            );
        }
    }

    #[test]
    fn test_warmup_cycle_does_not_sleep() {
        // Clock far from epoch, as a real wall clock would be
        let clock = SimulatedClock::starting_at(Timestamp::from_parts(1_700_000_000, 0));
        let mut pacer = RateLimiter::new();

        let report = pacer.sleep_hz(&clock, 10.0).unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.requested_sleep, Duration::ZERO);
        // Warm-up is not representative, so it is not an overrun either
        assert!(!report.overrun);
        assert_eq!(pacer.overrun_count(), 0);
    }

    #[test]
    fn test_full_period_sleep_when_body_is_free() {
        let clock = SimulatedClock::starting_at(Timestamp::from_parts(1_700_000_000, 0));
        let mut pacer = RateLimiter::new();
        pacer.sleep_hz(&clock, 1.0).unwrap(); // warm-up

        let report = pacer.sleep_hz(&clock, 1.0).unwrap();
        assert_eq!(report.requested_sleep, Duration::from_micros(1_000_000));
        assert!(!report.overrun);
    }

    #[test]
    fn test_overrun_clamps_to_zero_sleep() {
        let clock = SimulatedClock::starting_at(Timestamp::from_parts(1_700_000_000, 0));
        let mut pacer = RateLimiter::new();
        pacer.sleep_hz(&clock, 1.0).unwrap(); // warm-up

        // Body takes 1.2 s against a 1 s budget
        clock.advance(Duration::from_micros(1_200_000));
        let before = clock.now();
        let report = pacer.sleep_hz(&clock, 1.0).unwrap();

        assert_eq!(report.requested_sleep, Duration::ZERO);
        assert!(report.overrun);
        assert_eq!(pacer.overrun_count(), 1);
        // No sleep means simulated time did not move
        assert_eq!(clock.now(), before);
    }

    #[test]
    fn test_steady_state_period_with_variable_work() {
        let clock = SimulatedClock::starting_at(Timestamp::from_parts(1_700_000_000, 0));
        let mut pacer = RateLimiter::new();

        pacer.sleep_hz(&clock, 10.0).unwrap(); // discard warm-up

        let mut last = pacer.last_time();
        for work_ms in [0u64, 15, 40, 80, 5, 60, 0, 33] {
            clock.advance(Duration::from_millis(work_ms));
            pacer.sleep_hz(&clock, 10.0).unwrap();

            let period_us = pacer.last_time().diff(last);
            assert!(
                (period_us - 100_000).abs() <= 5_000,
                "period {period_us} µs out of tolerance for work {work_ms} ms"
            );
            last = pacer.last_time();
        }
        assert_eq!(pacer.overrun_count(), 0);
    }

    #[test]
    fn test_drift_carried_not_compounded() {
        let clock = SimulatedClock::starting_at(Timestamp::from_parts(1_700_000_000, 0));
        let mut pacer = RateLimiter::new();
        pacer.sleep_hz(&clock, 10.0).unwrap();

        // Imprecise sleep: an extra 3 ms happens outside the pacer
        clock.advance(Duration::from_millis(3));
        pacer.sleep_hz(&clock, 10.0).unwrap();
        let after_long = pacer.last_time();

        // Next cycle's budget shrinks by the drift instead of stacking it
        pacer.sleep_hz(&clock, 10.0).unwrap();
        let period_us = pacer.last_time().diff(after_long);
        assert_eq!(period_us, 100_000);
    }

    /// Clock whose first sleep is interrupted halfway through.
    struct InterruptingClock {
        inner: SimulatedClock,
        interrupted_once: std::sync::atomic::AtomicBool,
    }

    impl TimeSource for InterruptingClock {
        fn now(&self) -> Timestamp {
            self.inner.now()
        }

        fn sleep(&self, duration: Duration) -> TimebaseResult<()> {
            use std::sync::atomic::Ordering;
            if !self.interrupted_once.swap(true, Ordering::SeqCst) {
                let half = duration / 2;
                self.inner.advance(half);
                return Err(TimebaseError::SleepInterrupted { remaining: half });
            }
            self.inner.sleep(duration)
        }
    }

    #[test]
    fn test_interrupted_sleep_is_recoverable() {
        let clock = InterruptingClock {
            inner: SimulatedClock::starting_at(Timestamp::from_parts(1_700_000_000, 0)),
            interrupted_once: std::sync::atomic::AtomicBool::new(false),
        };
        let mut pacer = RateLimiter::new();
        pacer.sleep_hz(&clock, 10.0).unwrap(); // warm-up, does not sleep

        let report = pacer.sleep_hz(&clock, 10.0).unwrap();
        assert!(report.interrupted);

        // The loop keeps going; the next cycle paces normally
        let report = pacer.sleep_hz(&clock, 10.0).unwrap();
        assert!(!report.interrupted);
    }
}
