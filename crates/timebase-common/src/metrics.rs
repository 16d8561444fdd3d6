//! Inter-publish cadence tracking for periodic publishers.
//!
//! The quantity of interest is not the raw period but how far each
//! observed period lands from the target interval, so the retained
//! window stores signed deviations and the period statistics
//! (min/max/mean, percentiles) are reconstructed from them on demand.
//! A loop running consistently slower than its target shows up as a
//! climbing overrun count instead of being silently absorbed.

use std::time::Duration;

/// Deviation-from-target cadence tracker for one periodic publisher.
#[derive(Debug)]
pub struct PeriodMetrics {
    /// Target period in nanoseconds.
    target_ns: u64,
    /// Sliding window of signed deviations from the target, in
    /// nanoseconds. Oldest entries are overwritten once full.
    window: Box<[i64]>,
    /// Next write slot in the window.
    head: usize,
    /// Valid entries in the window (saturates at capacity).
    len: usize,
    /// Periods observed over the whole run, evicted from the window or not.
    observed: u64,
    /// Periods that landed past the target.
    overruns: u64,
    /// Most negative deviation seen (fastest period).
    min_dev_ns: i64,
    /// Most positive deviation seen (slowest period).
    max_dev_ns: i64,
    /// Running sum of deviations, for the mean.
    sum_dev_ns: i128,
}

impl PeriodMetrics {
    /// Create a tracker for the given target period.
    ///
    /// `window_size` bounds how many recent periods stay available for
    /// percentile queries; the lifetime counters are unaffected by it.
    #[must_use]
    pub fn new(window_size: usize, target_period: Duration) -> Self {
        Self {
            target_ns: target_period.as_nanos() as u64,
            window: vec![0i64; window_size.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
            observed: 0,
            overruns: 0,
            min_dev_ns: i64::MAX,
            max_dev_ns: i64::MIN,
            sum_dev_ns: 0,
        }
    }

    /// Record one observed period. Allocation-free.
    pub fn record(&mut self, period: Duration) {
        let deviation = period.as_nanos() as i64 - self.target_ns as i64;

        self.window[self.head] = deviation;
        self.head = (self.head + 1) % self.window.len();
        if self.len < self.window.len() {
            self.len += 1;
        }

        self.observed += 1;
        self.min_dev_ns = self.min_dev_ns.min(deviation);
        self.max_dev_ns = self.max_dev_ns.max(deviation);
        self.sum_dev_ns += i128::from(deviation);
        if deviation > 0 {
            self.overruns += 1;
        }
    }

    /// Period at the given percentile over the retained window.
    ///
    /// `None` when nothing has been recorded yet or the percentile is
    /// outside `[0, 100]` (NaN included).
    #[must_use]
    pub fn percentile(&self, pct: f64) -> Option<Duration> {
        if self.len == 0 || !(0.0..=100.0).contains(&pct) {
            return None;
        }

        let mut window = self.window[..self.len].to_vec();
        let rank = ((pct / 100.0) * (window.len() - 1) as f64).round() as usize;
        let (_, &mut deviation, _) = window.select_nth_unstable(rank);

        Some(reconstruct(self.target_ns, deviation))
    }

    /// Immutable snapshot for the shutdown summary.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let seen = self.observed > 0;
        MetricsSnapshot {
            total: self.observed,
            min_ns: seen
                .then(|| reconstruct(self.target_ns, self.min_dev_ns).as_nanos() as u64),
            max_ns: seen
                .then(|| reconstruct(self.target_ns, self.max_dev_ns).as_nanos() as u64),
            mean_ns: seen.then(|| {
                let mean_dev = self.sum_dev_ns / i128::from(self.observed);
                reconstruct(self.target_ns, mean_dev as i64).as_nanos() as u64
            }),
            overrun_count: self.overruns,
            target_ns: self.target_ns,
            filled: self.len,
        }
    }
}

/// Turn a signed deviation back into an absolute period.
///
/// Deviations produced by `record` always reconstruct to the original
/// non-negative period; the clamp only guards degenerate arithmetic.
fn reconstruct(target_ns: u64, deviation_ns: i64) -> Duration {
    let period_ns = (target_ns as i64).saturating_add(deviation_ns);
    Duration::from_nanos(period_ns.max(0) as u64)
}

/// Immutable snapshot of cadence metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total periods recorded.
    pub total: u64,
    /// Minimum period in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum period in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean period in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Number of periods past the target.
    pub overrun_count: u64,
    /// Target period in nanoseconds.
    pub target_ns: u64,
    /// Periods retained for percentile queries.
    pub filled: usize,
}

impl MetricsSnapshot {
    /// Jitter (max - min period) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
