//! Common utilities for integration tests.

#![allow(dead_code)] // Not every helper is used by every test module

use std::time::Duration;
use timebase_bus::SimulatedBus;
use timebase_common::{TimesyncConfig, Timestamp};
use timebase_core::{
    BroadcastSummary, BroadcasterBuilder, ShutdownToken, SimulatedClock, TimeBroadcaster,
};

/// Epoch used by the simulated-clock tests, roughly late 2023.
pub const TEST_EPOCH: i64 = 1_700_000_000;

/// A simulated clock starting at [`TEST_EPOCH`].
pub fn sim_clock() -> SimulatedClock {
    SimulatedClock::starting_at(Timestamp::from_parts(TEST_EPOCH, 0))
}

/// Configuration with the given broadcast interval and cycle limit,
/// everything else at defaults.
pub fn broadcast_config(interval: Duration, max_cycles: u64) -> TimesyncConfig {
    let mut config = TimesyncConfig::default();
    config.broadcast.interval = interval;
    config.broadcast.max_cycles = max_cycles;
    config
}

/// Run a cycle-limited broadcast against the simulated clock and return
/// the recording bus handle alongside the run summary.
pub fn run_simulated_broadcast(
    interval: Duration,
    max_cycles: u64,
) -> (SimulatedBus, BroadcastSummary) {
    let bus = SimulatedBus::new();
    let clock = sim_clock();
    let mut broadcaster: TimeBroadcaster<SimulatedBus> = BroadcasterBuilder::new(bus.clone())
        .interval(interval)
        .max_cycles(max_cycles)
        .build();

    let summary = broadcaster
        .run(&clock, &ShutdownToken::new())
        .expect("broadcast run failed");
    (bus, summary)
}
