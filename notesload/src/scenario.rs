//! The per-iteration CRUD sequence of a virtual user
use crate::client::{ApiClient, OperationOutcome};
use crate::signal::StopSignal;
use notesload_core::{millis, DEFAULT_THINK_TIME, ITERATIONS, ITERATIONS_ABORTED, ITERATION_DURATION};
use std::time::{Duration, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Furthest point an iteration reached.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IterationState {
    Started,
    Created,
    Fetched,
    Updated,
    Listed,
    Deleted,
    /// Create did not yield an id, nothing else was attempted.
    Aborted,
}

#[derive(Debug)]
pub struct IterationReport {
    pub vu: u64,
    pub iteration: u64,
    pub note_id: Option<String>,
    pub state: IterationState,
    /// One entry per request, in the order they were issued.
    pub outcomes: Vec<OperationOutcome>,
    /// Think-time pauses entered.
    pub pauses: u32,
    /// Whether a stop request cut the iteration short.
    pub stopped: bool,
    pub duration: Duration,
}

impl IterationReport {
    fn new(vu: u64, iteration: u64) -> Self {
        Self {
            vu,
            iteration,
            note_id: None,
            state: IterationState::Started,
            outcomes: vec![],
            pauses: 0,
            stopped: false,
            duration: Duration::ZERO,
        }
    }

    pub fn completed(&self) -> bool {
        self.state == IterationState::Deleted
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Drives one virtual user through `create → get → update → list → delete`, pausing for the
/// think-time after every step.
///
/// Only a failed create stops the sequence early. Every other validation failure is recorded and
/// the iteration carries on with the next step.
pub struct WorkloadScenario {
    client: ApiClient,
    think_time: Duration,
    vu: u64,
    iteration: u64,
}

impl WorkloadScenario {
    /// `vu` is the 1-based index of the virtual user running this scenario.
    pub fn new(vu: u64, client: ApiClient) -> Self {
        Self {
            client,
            think_time: DEFAULT_THINK_TIME,
            vu,
            iteration: 0,
        }
    }

    pub fn think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn vu(&self) -> u64 {
        self.vu
    }

    /// Number of iterations started so far.
    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    #[instrument(name = "iteration", skip_all, fields(vu = self.vu, iteration = self.iteration))]
    pub async fn run(&mut self, stop: &mut StopSignal) -> IterationReport {
        let iteration = self.iteration;
        self.iteration += 1;

        let metrics = self.client.metrics().clone();
        metrics.record_custom(ITERATIONS, 1.);

        let start = Instant::now();
        let mut report = IterationReport::new(self.vu, iteration);

        let (id, outcome) = self
            .client
            .create_note(
                &note_title(self.vu, iteration),
                &note_content(self.vu, iteration),
            )
            .await
            .into_parts();
        report.outcomes.push(outcome);

        let Some(id) = id else {
            debug!("Create failed, aborting iteration");
            report.state = IterationState::Aborted;
            metrics.record_custom(ITERATIONS_ABORTED, 1.);
            self.pause(stop, &mut report).await;
            return self.finish(report, start);
        };
        report.state = IterationState::Created;
        report.note_id = Some(id.clone());
        if !self.pause(stop, &mut report).await {
            return self.finish(report, start);
        }

        let result = self.client.get_note(&id).await;
        report.outcomes.push(result.outcome);
        report.state = IterationState::Fetched;
        if !self.pause(stop, &mut report).await {
            return self.finish(report, start);
        }

        let result = self
            .client
            .update_note(
                &id,
                &updated_title(self.vu, iteration),
                &updated_content(&id),
            )
            .await;
        report.outcomes.push(result.outcome);
        report.state = IterationState::Updated;
        if !self.pause(stop, &mut report).await {
            return self.finish(report, start);
        }

        let result = self.client.list_notes().await;
        report.outcomes.push(result.outcome);
        report.state = IterationState::Listed;
        if !self.pause(stop, &mut report).await {
            return self.finish(report, start);
        }

        let result = self.client.delete_note(&id).await;
        report.outcomes.push(result.outcome);
        report.state = IterationState::Deleted;
        self.pause(stop, &mut report).await;

        self.finish(report, start)
    }

    async fn pause(&self, stop: &mut StopSignal, report: &mut IterationReport) -> bool {
        report.pauses += 1;
        let completed = stop.pause(self.think_time).await;
        if !completed {
            trace!("Stop requested during think-time");
            report.stopped = true;
        }
        completed
    }

    fn finish(&self, mut report: IterationReport, start: Instant) -> IterationReport {
        report.duration = start.elapsed();
        self.client
            .metrics()
            .record_custom(ITERATION_DURATION, millis(report.duration));
        report
    }
}

fn note_title(vu: u64, iteration: u64) -> String {
    format!("Note {vu}-{iteration}")
}

fn note_content(vu: u64, iteration: u64) -> String {
    format!("This is test note content created by virtual user {vu} in iteration {iteration}")
}

fn updated_title(vu: u64, iteration: u64) -> String {
    format!("Updated Note {vu}-{iteration}")
}

fn updated_content(id: &str) -> String {
    format!("Updated content for note {id}")
}
