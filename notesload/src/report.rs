//! End-of-run text summary and structured result export
use crate::error::ExportError;
use notesload_core::{ExportConfig, MetricsSnapshot, ITERATIONS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Structured record of a finished run, suitable for a results file or a results store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultExport {
    pub test_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub metrics: MetricsSnapshot,
    pub summary: ExportSummary,
}

/// Headline numbers of a run. Durations in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub iterations: u64,
    pub http_requests: u64,
    pub avg_duration: f64,
    pub p95_duration: f64,
    pub error_rate_percent: f64,
}

/// Renders and exports [`MetricsSnapshot`]s.
///
/// Persisting is best-effort: [`SummaryReporter::persist`] logs failures and never fails the run.
pub struct SummaryReporter {
    config: ExportConfig,
    http: reqwest::Client,
}

impl SummaryReporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn render(&self, snapshot: &MetricsSnapshot) -> String {
        TextSummary(snapshot).to_string()
    }

    pub fn export(&self, snapshot: &MetricsSnapshot) -> ResultExport {
        ResultExport {
            test_id: Uuid::new_v4(),
            timestamp: OffsetDateTime::now_utc(),
            metrics: snapshot.clone(),
            summary: ExportSummary {
                iterations: snapshot.iterations(),
                http_requests: snapshot.total_requests(),
                avg_duration: snapshot.total.durations.avg,
                p95_duration: snapshot.total.durations.p95,
                error_rate_percent: snapshot.error_rate() * 100.,
            },
        }
    }

    /// Write `export` to every configured sink. Returns `true` when all of them succeeded.
    #[instrument(skip_all, fields(test_id = %export.test_id))]
    pub async fn persist(&self, export: &ResultExport) -> bool {
        let mut ok = true;

        if let Some(dir) = &self.config.results_dir {
            match self.write_file(export, dir).await {
                Ok(path) => info!("Results written to {}", path.display()),
                Err(err) => {
                    error!("Failed to write results to {}: {err}", dir.display());
                    ok = false;
                }
            }
        }

        if let Some(url) = &self.config.results_url {
            match self.post(export, url).await {
                Ok(()) => info!("Results posted to {url}"),
                Err(err) => {
                    error!("Failed to post results to {url}: {err}");
                    ok = false;
                }
            }
        }

        ok
    }

    /// Write `export` as `summary-<timestamp>.json` under `dir`, creating it if needed.
    pub async fn write_file(
        &self,
        export: &ResultExport,
        dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        let stamp = export.timestamp.format(&Rfc3339)?.replace([':', '.'], "-");
        let path = dir.join(format!("summary-{stamp}.json"));

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(export)?).await?;

        Ok(path)
    }

    pub async fn post(&self, export: &ResultExport, url: &Url) -> Result<(), ExportError> {
        let res = self.http.post(url.clone()).json(export).send().await?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(ExportError::Status(res.status().as_u16()))
        }
    }
}

struct TextSummary<'a>(&'a MetricsSnapshot);

impl fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.0;
        let total = &snapshot.total;

        writeln!(f)?;
        writeln!(f, " ✓ Test completed")?;
        writeln!(f)?;
        writeln!(f, " Scenarios:")?;
        writeln!(f, "   ✓ default: {} iterations", snapshot.iterations())?;
        writeln!(f)?;

        writeln!(f, " HTTP Metrics:")?;
        writeln!(
            f,
            "   http_req_duration: avg={:.2}ms, min={:.2}ms, max={:.2}ms, p(95)={:.2}ms, p(99)={:.2}ms",
            total.durations.avg,
            total.durations.min,
            total.durations.max,
            total.durations.p95,
            total.durations.p99,
        )?;
        writeln!(f, "   errors: {:.2}%", total.error_rate() * 100.)?;

        if !snapshot.operations.is_empty() {
            writeln!(f)?;
            writeln!(f, " Operations:")?;
            for (name, stats) in &snapshot.operations {
                writeln!(
                    f,
                    "   {name}: count={}, errors={} ({:.2}%), avg={:.2}ms, min={:.2}ms, max={:.2}ms",
                    stats.count,
                    stats.error_count,
                    stats.error_rate() * 100.,
                    stats.durations.avg,
                    stats.durations.min,
                    stats.durations.max,
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, " Custom Metrics:")?;
        for (name, stats) in snapshot.custom.iter().filter(|(n, _)| *n != ITERATIONS) {
            writeln!(
                f,
                "   {name}: count={}, avg={:.2}, min={:.2}, max={:.2}",
                stats.count,
                stats.mean(),
                stats.min,
                stats.max,
            )?;
        }
        writeln!(f, "   requests: {}", total.count)
    }
}
