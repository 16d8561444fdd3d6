//! Rate-limiter pacing properties.
//!
//! Verifies the steady-state cadence guarantee against the simulated
//! clock, plus the observable overrun accounting for loop bodies that
//! blow their period.

use super::common::sim_clock;
use std::time::Duration;
use timebase_core::{RateLimiter, TimeSource};

#[test]
fn test_ten_hz_loop_holds_cadence_under_variable_load() {
    let clock = sim_clock();
    let mut limiter = RateLimiter::new();

    // Warm-up cycle establishes the reference stamp
    limiter.sleep_hz(&clock, 10.0).unwrap();

    let mut stamps = Vec::new();
    for cycle in 0..50u64 {
        // Work between 0 and 80 ms, always under the 100 ms period
        clock.advance(Duration::from_millis((cycle * 17) % 81));
        limiter.sleep_hz(&clock, 10.0).unwrap();
        stamps.push(clock.now());
    }

    for pair in stamps.windows(2) {
        assert_eq!(pair[1].diff(pair[0]), 100_000, "period drifted");
    }
    assert_eq!(limiter.overrun_count(), 0);
}

#[test]
fn test_overrun_is_clamped_and_counted() {
    let clock = sim_clock();
    let mut limiter = RateLimiter::new();
    limiter.sleep_hz(&clock, 10.0).unwrap();

    // 150 ms of work against a 100 ms period
    clock.advance(Duration::from_millis(150));
    let before = clock.now();
    let report = limiter.sleep_hz(&clock, 10.0).unwrap();

    assert!(report.overrun);
    assert_eq!(report.requested_sleep, Duration::ZERO);
    assert_eq!(clock.now(), before, "overrun cycle must not sleep");
    assert_eq!(limiter.overrun_count(), 1);

    // The next on-time cycle paces from the late stamp, not the ideal one
    clock.advance(Duration::from_millis(20));
    limiter.sleep_hz(&clock, 10.0).unwrap();
    assert_eq!(clock.now().diff(before), 100_000);
    assert_eq!(limiter.overrun_count(), 1);
}

#[test]
fn test_back_to_back_calls_hold_the_full_period() {
    let clock = sim_clock();
    let mut limiter = RateLimiter::new();
    limiter.sleep_hz(&clock, 25.0).unwrap();

    // No work at all: every call sleeps the whole 40 ms period
    for _ in 0..10 {
        let before = clock.now();
        let report = limiter.sleep_hz(&clock, 25.0).unwrap();
        assert_eq!(report.requested_sleep, Duration::from_millis(40));
        assert_eq!(clock.now().diff(before), 40_000);
    }
}
