//! Broadcast cadence and ordering tests.
//!
//! The broadcaster's contract: one sample on the well-known channel per
//! interval, monotonically increasing utime values, and a clean shutdown
//! from another thread.

use super::common::{run_simulated_broadcast, TEST_EPOCH};
use std::thread;
use std::time::Duration;
use timebase_bus::{channels, SimulatedBus};
use timebase_common::MICROS_PER_SEC;
use timebase_core::{BroadcasterBuilder, ShutdownToken, SystemClock};

#[test]
fn test_five_seconds_give_five_increasing_samples() {
    let (bus, summary) = run_simulated_broadcast(Duration::from_secs(1), 5);

    let samples = bus.published_on(channels::TIMESYNC_CHANNEL);
    assert_eq!(samples.len(), 5);
    assert_eq!(summary.published, 5);
    assert_eq!(summary.publish_failures, 0);

    // First sample at the epoch, then exactly one interval apart
    assert_eq!(samples[0].utime.split().seconds, TEST_EPOCH);
    for pair in samples.windows(2) {
        assert_eq!(pair[1].utime.diff(pair[0].utime), MICROS_PER_SEC);
    }
}

#[test]
fn test_fast_cadence_keeps_samples_on_one_channel() {
    let (bus, summary) = run_simulated_broadcast(Duration::from_millis(20), 200);

    assert_eq!(summary.published, 200);
    // Nothing leaked onto other channels
    assert_eq!(bus.published().len(), 200);
    assert_eq!(bus.published_on(channels::TIMESYNC_CHANNEL).len(), 200);
    assert_eq!(summary.metrics.overrun_count, 0);
}

/// Wall-clock smoke test: a real broadcaster thread at 50 ms cadence,
/// shut down from the outside after roughly four intervals. Tolerances
/// are generous because CI schedulers are not.
#[test]
fn test_wall_clock_broadcast_and_shutdown() {
    let bus = SimulatedBus::new();
    let bus_handle = bus.clone();
    let shutdown = ShutdownToken::new();
    let token = shutdown.clone();

    let worker = thread::spawn(move || {
        let clock = SystemClock::new();
        let mut broadcaster = BroadcasterBuilder::new(bus)
            .interval(Duration::from_millis(50))
            .build();
        broadcaster.run(&clock, &token).unwrap()
    });

    thread::sleep(Duration::from_millis(220));
    shutdown.request();
    let summary = worker.join().expect("broadcast thread panicked");

    let samples = bus_handle.published_on(channels::TIMESYNC_CHANNEL);
    assert!(
        (2..=8).contains(&samples.len()),
        "expected 2-8 samples in ~220ms at 50ms cadence, got {}",
        samples.len()
    );
    assert_eq!(summary.published as usize, samples.len());
    for pair in samples.windows(2) {
        assert!(pair[1].utime > pair[0].utime);
    }
}
