use clap::Parser;
use notesload_core::{
    ConfigError, Credentials, ExportConfig, LoadTestConfig, Stage, TargetConfig, Thresholds,
    DEFAULT_API_PASSWORD, DEFAULT_API_USER, DEFAULT_BASE_URL, DEFAULT_MAX_ERROR_RATE,
    DEFAULT_STAGES,
};
use std::num::NonZeroU32;
use std::path::PathBuf;
use url::Url;

/// Load test a notes API with create/get/update/list/delete iterations.
///
/// Every option can also be given through the environment variable shown in `--help`.
#[derive(Parser, Debug)]
#[command(name = "notesload", version)]
pub struct NotesloadCli {
    /// Base URL of the notes API
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: Url,

    #[arg(short, long, env = "API_USER", default_value = DEFAULT_API_USER)]
    pub user: String,

    #[arg(
        long,
        env = "API_PASSWORD",
        default_value = DEFAULT_API_PASSWORD,
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Pause after every step of an iteration
    #[arg(long, env = "THINK_TIME", default_value = "1s")]
    pub think_time: humantime::Duration,

    /// Ramp stage as `<duration>:<target>`; repeat or comma-separate for several.
    /// Defaults to `30s:10,1m:10,30s:20,1m:20,30s:0`.
    #[arg(short, long = "stage", env = "STAGES", value_delimiter = ',')]
    pub stages: Vec<Stage>,

    #[arg(long, env = "P95", default_value = "500ms")]
    pub p95: humantime::Duration,

    #[arg(long, env = "P99", default_value = "1s")]
    pub p99: humantime::Duration,

    /// Highest acceptable fraction of failed requests
    #[arg(long, env = "MAX_ERROR_RATE", default_value_t = DEFAULT_MAX_ERROR_RATE)]
    pub max_error_rate: f64,

    /// Report metrics without a pass/fail verdict
    #[arg(long)]
    pub no_thresholds: bool,

    /// Cap on requests per second across all virtual users
    #[arg(long, env = "MAX_RPS")]
    pub max_rps: Option<NonZeroU32>,

    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "60s")]
    pub request_timeout: humantime::Duration,

    /// How long virtual users get to finish once the last stage is over
    #[arg(long, env = "GRACEFUL_STOP", default_value = "30s")]
    pub graceful_stop: humantime::Duration,

    /// Directory to write the JSON results export to
    #[arg(long, env = "RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// Endpoint to POST the JSON results export to
    #[arg(long, env = "RESULTS_URL")]
    pub results_url: Option<Url>,
}

impl NotesloadCli {
    pub fn into_config(self) -> Result<LoadTestConfig, ConfigError> {
        let target = TargetConfig::new(self.base_url, Credentials::new(self.user, self.password));

        let stages = if self.stages.is_empty() {
            DEFAULT_STAGES.to_vec()
        } else {
            self.stages
        };

        let thresholds = if self.no_thresholds {
            Thresholds::none()
        } else {
            Thresholds {
                p95: Some(self.p95.into()),
                p99: Some(self.p99.into()),
                max_error_rate: Some(self.max_error_rate),
            }
        };

        let config = LoadTestConfig {
            target,
            think_time: self.think_time.into(),
            stages,
            thresholds,
            max_rps: self.max_rps,
            request_timeout: self.request_timeout.into(),
            graceful_stop: self.graceful_stop.into(),
            export: ExportConfig {
                results_dir: self.results_dir,
                results_url: self.results_url,
            },
        };

        config.validate()?;
        Ok(config)
    }
}
