//! Shared, concurrency-safe request metrics
use metrics_util::AtomicBucket;
use notesload_core::{millis, CustomStats, DurationSummary, MetricsSnapshot, OperationStats};
use std::collections::{BTreeMap, HashMap};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};
use std::time::Duration;

#[cfg(feature = "metrics")]
const REQUESTS_TOTAL: &str = "notes_requests_total";
#[cfg(feature = "metrics")]
const REQUEST_ERRORS_TOTAL: &str = "notes_request_errors_total";
#[cfg(feature = "metrics")]
const REQUEST_DURATION: &str = "notes_request_duration";
#[cfg(feature = "metrics")]
const CUSTOM: &str = "notes_custom";

/// Records request counts, errors and durations per operation.
///
/// A single collector is shared (via `Arc`) by every virtual user of a run. Counters are atomic and
/// durations are pushed into a lock-free bucket, so concurrent `record_request` calls never lose
/// updates. The only lock taken on the hot path is a read lock on the operation table.
///
/// With the `metrics` feature enabled every sample is also forwarded to the [`metrics`] facade,
/// labelled by operation, for whichever exporter the binary installs.
#[derive(Default)]
pub struct MetricsCollector {
    operations: RwLock<HashMap<String, Arc<OperationAtomics>>>,
    custom: Mutex<BTreeMap<String, CustomStats>>,
}

#[derive(Default)]
struct OperationAtomics {
    count: AtomicU64,
    errors: AtomicU64,
    // Milliseconds
    durations: AtomicBucket<f64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, operation: &str, duration: Duration, is_error: bool) {
        let ms = millis(duration);
        let atomics = self.operation(operation);

        atomics.count.fetch_add(1, Ordering::Relaxed);
        if is_error {
            atomics.errors.fetch_add(1, Ordering::Relaxed);
        }
        atomics.durations.push(ms);

        #[cfg(feature = "metrics")]
        {
            let label = operation.to_string();
            ::metrics::counter!(REQUESTS_TOTAL, "operation" => label.clone()).increment(1);
            if is_error {
                ::metrics::counter!(REQUEST_ERRORS_TOTAL, "operation" => label.clone())
                    .increment(1);
            }
            ::metrics::histogram!(REQUEST_DURATION, "operation" => label).record(ms);
        }
    }

    pub fn record_custom(&self, name: &str, value: f64) {
        {
            let mut custom = self.custom.lock().unwrap_or_else(PoisonError::into_inner);
            custom.entry(name.to_string()).or_default().record(value);
        }

        #[cfg(feature = "metrics")]
        ::metrics::histogram!(CUSTOM, "metric" => name.to_string()).record(value);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut operations = BTreeMap::new();
        let mut all_samples = vec![];
        let mut total_count = 0;
        let mut total_errors = 0;

        {
            let table = self
                .operations
                .read()
                .unwrap_or_else(PoisonError::into_inner);

            for (name, atomics) in table.iter() {
                let count = atomics.count.load(Ordering::Relaxed);
                let error_count = atomics.errors.load(Ordering::Relaxed);
                let mut samples = atomics.durations.data();
                all_samples.extend_from_slice(&samples);

                total_count += count;
                total_errors += error_count;

                operations.insert(
                    name.clone(),
                    OperationStats {
                        count,
                        error_count,
                        durations: DurationSummary::from_millis(&mut samples),
                    },
                );
            }
        }

        let custom = self
            .custom
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        MetricsSnapshot {
            operations,
            total: OperationStats {
                count: total_count,
                error_count: total_errors,
                durations: DurationSummary::from_millis(&mut all_samples),
            },
            custom,
        }
    }

    fn operation(&self, name: &str) -> Arc<OperationAtomics> {
        {
            let table = self
                .operations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(atomics) = table.get(name) {
                return atomics.clone();
            }
        }

        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
