use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one stage is required")]
    NoStages,

    #[error("Invalid stage `{0}`, expected `<duration>:<target>` (e.g. `30s:10`)")]
    InvalidStage(String),

    #[error("Error rate limit must be within [0, 1], got {0}")]
    InvalidErrorRate(f64),

    #[error("Invalid duration: {0}")]
    Duration(#[from] humantime::DurationError),
}
