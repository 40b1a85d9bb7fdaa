use crate::ITERATIONS;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Statistics about a driver run. Request metrics live in the [`MetricsSnapshot`].
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunStatistics {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub elapsed: Duration,
    pub max_vus: usize,
    pub vus_started: usize,
}

/// Point-in-time view of everything a `MetricsCollector` has recorded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Keyed by operation name (e.g. `create_note`).
    pub operations: BTreeMap<String, OperationStats>,
    /// Aggregate over every operation.
    pub total: OperationStats,
    pub custom: BTreeMap<String, CustomStats>,
}

impl MetricsSnapshot {
    pub fn operation(&self, name: &str) -> Option<&OperationStats> {
        self.operations.get(name)
    }

    pub fn custom(&self, name: &str) -> Option<&CustomStats> {
        self.custom.get(name)
    }

    /// Number of scenario iterations started.
    pub fn iterations(&self) -> u64 {
        self.custom(ITERATIONS).map(|c| c.count).unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.total.count
    }

    pub fn error_rate(&self) -> f64 {
        self.total.error_rate()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: u64,
    pub error_count: u64,
    pub durations: DurationSummary,
}

impl OperationStats {
    /// Fraction of failed requests, `0.0` when nothing was recorded.
    pub fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.
        } else {
            self.error_count as f64 / self.count as f64
        }
    }
}

/// Request duration distribution, all values in milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl DurationSummary {
    /// Summarize raw samples (in milliseconds). Sorts `samples` in place.
    pub fn from_millis(samples: &mut [f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        samples.sort_by(f64::total_cmp);
        let sum: f64 = samples.iter().sum();

        Self {
            min: samples[0],
            max: samples[samples.len() - 1],
            avg: sum / samples.len() as f64,
            p50: percentile(samples, 0.50),
            p90: percentile(samples, 0.90),
            p95: percentile(samples, 0.95),
            p99: percentile(samples, 0.99),
        }
    }
}

/// Fractional milliseconds, the unit every duration statistic is kept in.
pub fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

// Nearest-rank percentile over sorted, non-empty samples
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    let n = sorted.len();
    let rank = (quantile * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

/// Aggregate of a user-defined metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl CustomStats {
    pub fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Result of checking one threshold against a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub name: String,
    pub limit: f64,
    pub observed: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        write!(
            f,
            "{mark} {}<{}: observed {:.2}",
            self.name, self.limit, self.observed
        )
    }
}

/// Pass/fail verdict of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub results: Vec<ThresholdResult>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}
