use crate::cli::NotesloadCli;
use crate::error::RuntimeError;
use clap::Parser;
use notesload::{threshold, Driver, MetricsCollector, ResultExport, SummaryReporter};
use notesload_core::{LoadTestConfig, MetricsSnapshot, RunStatistics, Verdict};
use std::sync::Arc;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub stats: RunStatistics,
    pub snapshot: MetricsSnapshot,
    /// Human-readable end-of-run summary
    pub summary: String,
    pub export: ResultExport,
    pub verdict: Verdict,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

/// Runs a full load test: drive the stage schedule, then summarize, export and judge the results.
///
/// # Example
/// ```no_run
/// use notesload_runtime::LoadTestRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     let outcome = LoadTestRuntime::from_args().unwrap().run().await.unwrap();
///     println!("{}", outcome.summary);
/// }
/// ```
pub struct LoadTestRuntime {
    config: LoadTestConfig,
    metrics: Arc<MetricsCollector>,
}

impl LoadTestRuntime {
    pub fn new(config: LoadTestConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Build the configuration from command line arguments and environment variables.
    pub fn from_args() -> Result<Self, RuntimeError> {
        Ok(Self::new(NotesloadCli::parse().into_config()?))
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    /// Collector the run records into, for callers that want to observe it while running.
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    #[instrument(name = "notesload", skip_all, fields(target = %self.config.target.base_url))]
    pub async fn run(self) -> Result<RunOutcome, RuntimeError> {
        self.config.validate()?;

        let driver = Driver::new(self.config.clone(), self.metrics.clone())?;
        let stats = driver.run().await;
        let snapshot = self.metrics.snapshot();
        debug!(
            "{} iterations by {} virtual users",
            snapshot.iterations(),
            stats.vus_started
        );

        let reporter = SummaryReporter::new(self.config.export.clone());
        let summary = reporter.render(&snapshot);
        let export = reporter.export(&snapshot);
        if !reporter.persist(&export).await {
            warn!("Results could not be persisted to every configured sink");
        }

        let verdict = threshold::evaluate(&self.config.thresholds, &snapshot);
        for result in &verdict.results {
            if result.passed {
                info!("{result}");
            } else {
                error!("{result}");
            }
        }

        Ok(RunOutcome {
            stats,
            snapshot,
            summary,
            export,
            verdict,
        })
    }
}
