//! Scan-cycle duration accounting.
//!
//! A fixed ring buffer keeps the most recent cycle durations so the
//! scan path never allocates after construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wall-clock statistics over executed scan cycles.
#[derive(Debug, Clone)]
pub struct CycleMetrics {
    /// Ring buffer of cycle durations in nanoseconds.
    samples: Box<[u64]>,
    write_pos: usize,
    sample_count: usize,
    total_cycles: u64,
    last_ns: u64,
    min_ns: u64,
    max_ns: u64,
    sum_ns: u64,
    /// Cycles longer than the configured period.
    overrun_count: u64,
    period_ns: u64,
}

impl CycleMetrics {
    /// Create a collector keeping `histogram_size` samples.
    ///
    /// Cycles longer than `period` are counted as overruns.
    #[must_use]
    pub fn new(histogram_size: usize, period: Duration) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_cycles: 0,
            last_ns: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            overrun_count: 0,
            period_ns: duration_ns(period),
        }
    }

    /// Record the duration of one cycle.
    pub fn record(&mut self, duration: Duration) {
        let ns = duration_ns(duration);

        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = (self.sample_count + 1).min(self.samples.len());

        self.total_cycles += 1;
        self.last_ns = ns;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);

        if ns > self.period_ns {
            self.overrun_count += 1;
        }
    }

    /// Total cycles recorded.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Duration of the most recent cycle.
    #[must_use]
    pub fn last(&self) -> Option<Duration> {
        (self.total_cycles > 0).then(|| Duration::from_nanos(self.last_ns))
    }

    /// Shortest cycle observed.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.total_cycles > 0).then(|| Duration::from_nanos(self.min_ns))
    }

    /// Longest cycle observed.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.total_cycles > 0).then(|| Duration::from_nanos(self.max_ns))
    }

    /// Mean cycle duration.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (self.total_cycles > 0).then(|| Duration::from_nanos(self.sum_ns / self.total_cycles))
    }

    /// Number of cycles longer than the configured period.
    #[must_use]
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Percentile (0.0 to 100.0) over the retained samples.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 || !(0.0..=100.0).contains(&percentile) {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(Duration::from_nanos(sorted[idx.min(sorted.len() - 1)]))
    }

    /// Forget every sample, keeping the buffer.
    pub fn clear(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_cycles = 0;
        self.last_ns = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
        self.overrun_count = 0;
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let nonzero = self.total_cycles > 0;
        MetricsSnapshot {
            total_cycles: self.total_cycles,
            last_ns: nonzero.then_some(self.last_ns),
            min_ns: nonzero.then_some(self.min_ns),
            max_ns: nonzero.then_some(self.max_ns),
            mean_ns: nonzero.then(|| self.sum_ns / self.total_cycles),
            overrun_count: self.overrun_count,
        }
    }
}

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Serializable point-in-time view of [`CycleMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total cycles recorded.
    pub total_cycles: u64,
    /// Most recent cycle, in nanoseconds.
    pub last_ns: Option<u64>,
    /// Shortest cycle, in nanoseconds.
    pub min_ns: Option<u64>,
    /// Longest cycle, in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean cycle, in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Cycles longer than the period.
    pub overrun_count: u64,
}
