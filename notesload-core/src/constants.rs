use crate::Stage;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_API_USER: &str = "admin";
pub const DEFAULT_API_PASSWORD: &str = "password";

/// Pause applied after every step of an iteration.
pub const DEFAULT_THINK_TIME: Duration = Duration::from_secs(1);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How long virtual users get to reach their next pause once the run is over.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// The default p95 latency limit
pub const DEFAULT_P95_LIMIT: Duration = Duration::from_millis(500);

/// The default p99 latency limit
pub const DEFAULT_P99_LIMIT: Duration = Duration::from_millis(1000);

/// The default ceiling on the failed request rate
pub const DEFAULT_MAX_ERROR_RATE: f64 = 0.01;

/// How often the driver re-evaluates the target virtual user count.
pub const RAMP_INTERVAL: Duration = Duration::from_millis(100);

/// Ramp to 10 users, hold, ramp to 20, hold, ramp down.
pub const DEFAULT_STAGES: [Stage; 5] = [
    Stage::new(Duration::from_secs(30), 10),
    Stage::new(Duration::from_secs(60), 10),
    Stage::new(Duration::from_secs(30), 20),
    Stage::new(Duration::from_secs(60), 20),
    Stage::new(Duration::from_secs(30), 0),
];

/* Custom metric names recorded by the workload scenario */

pub const ITERATIONS: &str = "iterations";
pub const ITERATIONS_ABORTED: &str = "iterations_aborted";
pub const ITERATION_DURATION: &str = "iteration_duration";
