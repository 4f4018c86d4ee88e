use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use hdrhistogram::Histogram;

use crate::sharded_stats;

pub type ShardedStats = sharded_stats::ShardedStats<PhaseStatsFactory>;

const LATENCY_SIG_FIG: u8 = 3;

pub struct PhaseStatsFactory {
    // Cloned into every new shard, so that shard creation cannot fail
    empty_histogram: Histogram<u64>,
}

impl PhaseStatsFactory {
    pub fn new() -> Result<Self> {
        let empty_histogram =
            Histogram::new(LATENCY_SIG_FIG).context("Failed to create a latency histogram")?;
        Ok(Self { empty_histogram })
    }
}

impl sharded_stats::StatsFactory for PhaseStatsFactory {
    type Stats = PhaseStats;

    fn create(&self) -> PhaseStats {
        PhaseStats {
            attempts: 0,
            errors: 0,
            retries: 0,
            latency_us: Histogram::new_from(&self.empty_histogram),
        }
    }
}

/// Attempts made against the store during one phase.
pub struct PhaseStats {
    /// Store calls made, retries included.
    pub attempts: u64,

    /// Attempts which returned an error.
    pub errors: u64,

    pub retries: u64,

    /// Latency of successful attempts, in microseconds.
    pub latency_us: Histogram<u64>,
}

impl sharded_stats::Stats for PhaseStats {
    fn clear(&mut self) {
        self.attempts = 0;
        self.errors = 0;
        self.retries = 0;
        self.latency_us.reset();
    }

    fn combine(&mut self, other: &Self) {
        self.attempts += other.attempts;
        self.errors += other.errors;
        self.retries += other.retries;
        // Both histograms are created with the same bounds
        let _ = self.latency_us.add(&other.latency_us);
    }
}

impl PhaseStats {
    pub fn account_attempt<T, E>(&mut self, latency: Duration, result: &Result<T, E>) {
        self.attempts += 1;
        match result {
            Ok(_) => {
                let _ = self.latency_us.record(latency.as_micros() as u64);
            }
            Err(_) => self.errors += 1,
        }
    }

    pub fn account_retry(&mut self) {
        self.retries += 1;
    }

    pub fn latency_percentile(&self, percentile: f64) -> Duration {
        Duration::from_micros(self.latency_us.value_at_percentile(percentile))
    }

    pub fn max_latency(&self) -> Duration {
        Duration::from_micros(self.latency_us.max())
    }
}

impl fmt::Display for PhaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts={} errors={} retries={} p50={:?} p99={:?} max={:?}",
            self.attempts,
            self.errors,
            self.retries,
            self.latency_percentile(50.0),
            self.latency_percentile(99.0),
            self.max_latency(),
        )
    }
}
