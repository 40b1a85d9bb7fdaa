use notesload_core::{millis, MetricsSnapshot, ThresholdResult, Thresholds, Verdict};
use std::time::Duration;

/// Check the aggregate request metrics of `snapshot` against `thresholds`.
///
/// Latency limits are compared against the aggregate p95/p99 in milliseconds, the error rate
/// against the fraction of failed requests. A run with no requests has an error rate of `0`.
pub fn evaluate(thresholds: &Thresholds, snapshot: &MetricsSnapshot) -> Verdict {
    let mut results = vec![];
    let durations = &snapshot.total.durations;

    if let Some(limit) = thresholds.p95 {
        results.push(latency_result("http_req_duration p(95)", limit, durations.p95));
    }

    if let Some(limit) = thresholds.p99 {
        results.push(latency_result("http_req_duration p(99)", limit, durations.p99));
    }

    if let Some(limit) = thresholds.max_error_rate {
        let observed = snapshot.error_rate();
        results.push(ThresholdResult {
            name: "errors rate".to_string(),
            limit,
            observed,
            passed: observed < limit,
        });
    }

    Verdict { results }
}

fn latency_result(name: &str, limit: Duration, observed: f64) -> ThresholdResult {
    let limit = millis(limit);
    ThresholdResult {
        name: name.to_string(),
        limit,
        observed,
        passed: observed < limit,
    }
}
