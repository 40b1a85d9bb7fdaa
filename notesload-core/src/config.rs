use crate::{
    ConfigError, DEFAULT_GRACEFUL_STOP, DEFAULT_MAX_ERROR_RATE, DEFAULT_P95_LIMIT,
    DEFAULT_P99_LIMIT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STAGES, DEFAULT_THINK_TIME,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Full configuration of a load test run.
///
/// Populated once at startup (see `notesload-runtime`) and handed by reference to the driver,
/// scenarios and clients.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadTestConfig {
    pub target: TargetConfig,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub think_time: Duration,
    pub stages: Vec<Stage>,
    pub thresholds: Thresholds,
    pub max_rps: Option<NonZeroU32>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub graceful_stop: Duration,
    #[serde(default)]
    pub export: ExportConfig,
}

impl LoadTestConfig {
    pub fn new(target: TargetConfig) -> Self {
        Self {
            target,
            think_time: DEFAULT_THINK_TIME,
            stages: DEFAULT_STAGES.to_vec(),
            thresholds: Thresholds::default(),
            max_rps: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            export: ExportConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }

        if let Some(rate) = self.thresholds.max_error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidErrorRate(rate));
            }
        }

        Ok(())
    }

    /// Total wall-clock length of the stage schedule.
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn max_target(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_url: Url,
    pub credentials: Credentials,
}

impl TargetConfig {
    pub fn new(base_url: Url, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A time-boxed target concurrency level. The driver ramps linearly from the previous stage's
/// target to this one over `duration`.
#[serde_as]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub const fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidStage(s.to_string()))?;

        let duration = humantime::parse_duration(duration.trim())?;
        let target = target
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidStage(s.to_string()))?;

        Ok(Stage { duration, target })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            humantime::format_duration(self.duration),
            self.target
        )
    }
}

/// Pass/fail limits evaluated against the final metrics snapshot. A `None` limit is not checked.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub p95: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub p99: Option<Duration>,
    pub max_error_rate: Option<f64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p95: Some(DEFAULT_P95_LIMIT),
            p99: Some(DEFAULT_P99_LIMIT),
            max_error_rate: Some(DEFAULT_MAX_ERROR_RATE),
        }
    }
}

impl Thresholds {
    pub fn none() -> Self {
        Self {
            p95: None,
            p99: None,
            max_error_rate: None,
        }
    }
}

/// Where the structured result export is persisted. Both sinks are optional and best-effort.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    pub results_dir: Option<PathBuf>,
    pub results_url: Option<Url>,
}
