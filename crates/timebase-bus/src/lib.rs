//! Message-bus plane abstractions for the time-base subsystem.
//!
//! This crate provides:
//! - [`TimeBus`] trait for abstracting the publish side of the robot's
//!   pub/sub bus
//! - [`TimeSyncSample`], the single-field message other processes use to
//!   align their notion of "now"
//! - [`channels`] module with the robot's well-known channel names
//! - [`SimulatedBus`], an in-memory bus for tests and bench runs
//!
//! The real transport (LCM over UDP multicast) is an external
//! collaborator; this crate only owns the seam.

pub mod channels;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use timebase_common::{TimebaseError, TimebaseResult, Timestamp};

/// A single broadcast time reference: "now" at the moment of publication.
///
/// Immutable once constructed; its identity is its value plus the channel
/// it was transmitted on. On the wire it is exactly one signed 64-bit
/// microsecond count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSyncSample {
    /// Publisher's clock reading at the moment of broadcast, in
    /// microseconds.
    pub utime: Timestamp,
}

impl TimeSyncSample {
    /// Construct a sample from a clock reading.
    #[must_use]
    pub const fn new(utime: Timestamp) -> Self {
        Self { utime }
    }

    /// Encode the payload as 8 little-endian bytes.
    ///
    /// The encoding is fixed-width; the transport may wrap it in its own
    /// framing (fingerprints, channel headers) but the payload is owned
    /// here.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.utime.as_micros().to_le_bytes()
    }

    /// Decode a payload produced by [`TimeSyncSample::to_bytes`].
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            utime: Timestamp::from_micros(i64::from_le_bytes(bytes)),
        }
    }
}

/// Publish-side bus abstraction.
///
/// Publication is fire-and-forget: no acknowledgment, no backpressure.
/// A failed publish is a transient error; the caller is expected to log
/// it and attempt the next cycle.
pub trait TimeBus: Send {
    /// Publish one sample on the named channel.
    ///
    /// # Errors
    ///
    /// `PublishFailed` when the transport rejects the message. Treated as
    /// recoverable by all callers in this subsystem.
    fn publish(&mut self, channel: &str, sample: &TimeSyncSample) -> TimebaseResult<()>;

    /// Whether the underlying transport currently accepts messages.
    fn is_connected(&self) -> bool {
        true
    }

    /// Release transport resources. Default no-op.
    fn shutdown(&mut self) -> TimebaseResult<()> {
        Ok(())
    }
}

impl<B: TimeBus + ?Sized> TimeBus for Box<B> {
    fn publish(&mut self, channel: &str, sample: &TimeSyncSample) -> TimebaseResult<()> {
        (**self).publish(channel, sample)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn shutdown(&mut self) -> TimebaseResult<()> {
        (**self).shutdown()
    }
}

/// In-memory bus that records every publication.
///
/// Cloning yields another handle to the same recording, so a test can
/// keep one handle for assertions while the broadcaster owns the other.
/// Can be told to fail the next N publishes to exercise transient-failure
/// paths.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    inner: Arc<SimulatedBusInner>,
}

#[derive(Debug, Default)]
struct SimulatedBusInner {
    published: Mutex<Vec<(String, TimeSyncSample)>>,
    fail_next: AtomicUsize,
}

impl SimulatedBus {
    /// Create an empty simulated bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publication observed so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, TimeSyncSample)> {
        self.inner
            .published
            .lock()
            .expect("simulated bus lock poisoned")
            .clone()
    }

    /// Samples observed on one channel, in order.
    #[must_use]
    pub fn published_on(&self, channel: &str) -> Vec<TimeSyncSample> {
        self.inner
            .published
            .lock()
            .expect("simulated bus lock poisoned")
            .iter()
            .filter(|(ch, _)| ch == channel)
            .map(|&(_, sample)| sample)
            .collect()
    }

    /// Make the next `n` publish calls fail with `PublishFailed`.
    pub fn fail_next_publishes(&self, n: usize) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }
}

impl TimeBus for SimulatedBus {
    fn publish(&mut self, channel: &str, sample: &TimeSyncSample) -> TimebaseResult<()> {
        // Atomic decrement: concurrent publishers must consume exactly
        // the injected number of failures, no more, no fewer.
        let claimed_failure = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if claimed_failure {
            return Err(TimebaseError::PublishFailed {
                channel: channel.to_string(),
                reason: "simulated transport failure".to_string(),
            });
        }

        tracing::trace!(channel, utime = sample.utime.as_micros(), "simulated publish");
        self.inner
            .published
            .lock()
            .expect("simulated bus lock poisoned")
            .push((channel.to_string(), *sample));
        Ok(())
    }
}
