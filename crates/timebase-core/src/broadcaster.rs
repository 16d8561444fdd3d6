//! Periodic time-broadcast publisher.
//!
//! An infinite loop that samples the clock at a fixed cadence and emits
//! the sample on a well-known channel so independently-clocked processes
//! can agree on a common time reference. Fire-and-forget: downstream
//! consumers handle missed or duplicate samples, and a failed publish
//! never stops the next cycle.

use crate::clock::TimeSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timebase_bus::{TimeBus, TimeSyncSample};
use timebase_common::{
    LoopState, MetricsSnapshot, PeriodMetrics, TimebaseError, TimebaseResult, TimesyncConfig,
    Timestamp,
};
use tracing::{debug, info, trace, warn};

/// How often a sleeping broadcaster checks for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Cooperative cancellation handle for the broadcast loop.
///
/// The broadcast sleep is sliced so a shutdown request interrupts the
/// wait within one poll interval. Clone freely - all handles share one
/// flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Create an unsignaled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Callable from any thread.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// What a finished broadcast run looked like.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastSummary {
    /// Samples successfully handed to the transport.
    pub published: u64,
    /// Cycles whose publish failed (the loop continued anyway).
    pub publish_failures: u64,
    /// Inter-publish period statistics.
    pub metrics: MetricsSnapshot,
}

/// Periodic time-broadcast publisher.
///
/// Owns its bus handle and pacing state; designed to run on one dedicated
/// thread with no internal locking. Uses a plain fixed-interval sleep
/// rather than [`crate::RateLimiter`] - consumers only expect a sample
/// approximately every interval, so prior-cycle compensation buys
/// nothing here.
pub struct TimeBroadcaster<B: TimeBus> {
    bus: B,
    channel: String,
    interval: Duration,
    max_cycles: u64,
    state: LoopState,
    metrics: PeriodMetrics,
    published: u64,
    publish_failures: u64,
    last_publish: Option<Timestamp>,
}

impl<B: TimeBus> TimeBroadcaster<B> {
    /// Create a broadcaster from configuration.
    #[must_use]
    pub fn new(bus: B, config: &TimesyncConfig) -> Self {
        BroadcasterBuilder::new(bus).config(config).build()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Samples successfully published so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Inter-publish period metrics.
    #[must_use]
    pub fn metrics(&self) -> &PeriodMetrics {
        &self.metrics
    }

    /// Run the broadcast loop until shutdown (or until the configured
    /// cycle limit, for bench and test runs).
    ///
    /// Each cycle samples the clock, publishes a [`TimeSyncSample`] on
    /// the configured channel, and sleeps the configured interval. A
    /// failed publish is logged and the loop continues; only lifecycle
    /// misuse or a non-recoverable sleep failure ends the run early.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a zero interval (a zero-interval broadcaster
    /// would busy-loop and publish duplicate timestamps),
    /// `InvalidStateTransition` if the broadcaster already ran. A
    /// non-recoverable sleep failure also ends the run, after the normal
    /// stop transition and bus teardown.
    pub fn run<C: TimeSource + ?Sized>(
        &mut self,
        clock: &C,
        shutdown: &ShutdownToken,
    ) -> TimebaseResult<BroadcastSummary> {
        if self.interval.is_zero() {
            return Err(TimebaseError::InvalidArgument(
                "broadcast interval must be non-zero".to_string(),
            ));
        }
        self.state.transition_to(LoopState::Running)?;

        info!(
            channel = %self.channel,
            interval_us = self.interval.as_micros() as u64,
            "Starting time broadcast"
        );

        let mut cycles: u64 = 0;
        let loop_result = loop {
            if shutdown.is_requested() {
                break Ok(());
            }
            self.run_cycle(clock);
            cycles += 1;

            if self.max_cycles > 0 && cycles >= self.max_cycles {
                debug!(cycles, "Cycle limit reached");
                break Ok(());
            }

            if let Err(e) = self.sleep_interval(clock, shutdown) {
                break Err(e);
            }
        };

        // Tear down on the error path too, so the state machine never
        // sticks in Running with a live bus handle.
        self.state.transition_to(LoopState::Stopped)?;
        if let Err(e) = self.bus.shutdown() {
            warn!(error = %e, "Bus shutdown reported an error");
        }
        loop_result?;

        let summary = BroadcastSummary {
            published: self.published,
            publish_failures: self.publish_failures,
            metrics: self.metrics.snapshot(),
        };
        info!(
            published = summary.published,
            failures = summary.publish_failures,
            overruns = summary.metrics.overrun_count,
            "Time broadcast stopped"
        );
        Ok(summary)
    }

    /// Sample the clock and publish one time-sync sample.
    fn run_cycle<C: TimeSource + ?Sized>(&mut self, clock: &C) {
        let now = clock.now();
        let sample = TimeSyncSample::new(now);

        match self.bus.publish(&self.channel, &sample) {
            Ok(()) => {
                self.published += 1;
                if let Some(prev) = self.last_publish {
                    let period_us = now.diff(prev);
                    if period_us >= 0 {
                        self.metrics.record(Duration::from_micros(period_us as u64));
                    }
                }
                self.last_publish = Some(now);
                trace!(utime = now.as_micros(), "Published time sample");
            }
            Err(e) => {
                // Transient by contract: attempt the next cycle regardless
                self.publish_failures += 1;
                warn!(error = %e, "Publish failed; continuing to next cycle");
            }
        }
    }

    /// Sleep the inter-sample interval in slices, so a shutdown request
    /// interrupts the wait within [`SHUTDOWN_POLL`].
    fn sleep_interval<C: TimeSource + ?Sized>(
        &self,
        clock: &C,
        shutdown: &ShutdownToken,
    ) -> TimebaseResult<()> {
        let mut remaining = self.interval;
        while !remaining.is_zero() {
            if shutdown.is_requested() {
                return Ok(());
            }
            let chunk = remaining.min(SHUTDOWN_POLL);
            match clock.sleep(chunk) {
                Ok(()) => remaining = remaining.saturating_sub(chunk),
                Err(TimebaseError::SleepInterrupted { remaining: unslept }) => {
                    debug!(?unslept, "Broadcast sleep interrupted");
                    remaining = remaining.saturating_sub(chunk.saturating_sub(unslept));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Builder for [`TimeBroadcaster`].
pub struct BroadcasterBuilder<B: TimeBus> {
    bus: B,
    channel: String,
    interval: Duration,
    max_cycles: u64,
    histogram_size: usize,
}

impl<B: TimeBus> BroadcasterBuilder<B> {
    /// Start a builder with library defaults (1 Hz on `MBOT_TIMESYNC`).
    #[must_use]
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            channel: timebase_bus::channels::TIMESYNC_CHANNEL.to_string(),
            interval: Duration::from_secs(1),
            max_cycles: 0,
            histogram_size: 1_024,
        }
    }

    /// Apply broadcast and metrics settings from a full configuration.
    #[must_use]
    pub fn config(mut self, config: &TimesyncConfig) -> Self {
        self.channel = config.broadcast.channel.clone();
        self.interval = config.broadcast.interval;
        self.max_cycles = config.broadcast.max_cycles;
        self.histogram_size = config.metrics.histogram_size;
        self
    }

    /// Set the publish channel.
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the inter-sample interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Limit the run to `max_cycles` cycles (0 = until shutdown).
    #[must_use]
    pub fn max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Build the broadcaster.
    #[must_use]
    pub fn build(self) -> TimeBroadcaster<B> {
        let metrics = PeriodMetrics::new(self.histogram_size, self.interval);
        TimeBroadcaster {
            bus: self.bus,
            channel: self.channel,
            interval: self.interval,
            max_cycles: self.max_cycles,
            state: LoopState::Idle,
            metrics,
            published: 0,
            publish_failures: 0,
            last_publish: None,
        }
    }
}
