#![cfg_attr(docsrs, feature(doc_cfg))]
//! A CRUD workload driver for load testing a notes REST API.
//!
//! Each virtual user runs a [`WorkloadScenario`]: create a note, fetch it, update it, list the
//! collection and delete it, pausing for a think-time after every step. Every request is
//! validated by the [`ApiClient`] and recorded into a shared [`MetricsCollector`], whose final
//! snapshot the [`SummaryReporter`] renders and exports.
//!
//! # Example
//! ```no_run
//! use notesload::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let target = TargetConfig::new(
//!         "http://localhost:5000".parse().unwrap(),
//!         Credentials::new("admin", "password"),
//!     );
//!     let config = LoadTestConfig::new(target);
//!
//!     let metrics = Arc::new(MetricsCollector::new());
//!     let driver = Driver::new(config.clone(), metrics.clone()).unwrap();
//!     driver.run().await;
//!
//!     let reporter = SummaryReporter::new(config.export.clone());
//!     println!("{}", reporter.render(&metrics.snapshot()));
//! }
//! ```

pub mod client;
pub mod collector;
pub mod driver;
pub mod error;
pub mod report;
pub mod scenario;
pub mod signal;
pub mod threshold;

pub use client::{ApiClient, CallResult, OperationOutcome};
pub use collector::MetricsCollector;
pub use driver::Driver;
pub use error::{ClientError, ExportError};
pub use report::{ExportSummary, ResultExport, SummaryReporter};
pub use scenario::{IterationReport, IterationState, WorkloadScenario};
pub use signal::{StopHandle, StopSignal};

pub mod prelude {
    pub use crate::{
        ApiClient, Driver, IterationState, MetricsCollector, StopSignal, SummaryReporter,
        WorkloadScenario,
    };
    pub use notesload_core::{
        Credentials, LoadTestConfig, MetricsSnapshot, Note, Operation, Stage, TargetConfig,
        Thresholds, Verdict,
    };
}
