//! Stage-based virtual user scheduling
use crate::client::{http_client, rate_limiter, ApiClient};
use crate::collector::MetricsCollector;
use crate::error::ClientError;
use crate::scenario::WorkloadScenario;
use crate::signal::{StopHandle, StopSignal};
use notesload_core::{LoadTestConfig, RunStatistics, Stage, RAMP_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
#[allow(unused_imports)]
use tracing::{debug, error, info, info_span, instrument, trace, warn, Instrument};

/// Runs one [`WorkloadScenario`] loop per virtual user, following the configured stages.
///
/// Every [`RAMP_INTERVAL`] the target user count is interpolated from the stage schedule. Extra
/// users are spawned as tokio tasks; surplus users are asked to stop and finish at their next
/// think-time pause. Once the schedule is over every user is stopped and given
/// `graceful_stop` to wind down before being aborted.
pub struct Driver {
    config: LoadTestConfig,
    client: ApiClient,
}

impl Driver {
    pub fn new(config: LoadTestConfig, metrics: Arc<MetricsCollector>) -> Result<Self, ClientError> {
        let mut client =
            ApiClient::new(&config.target, metrics)?.with_http_client(http_client(&config)?);

        if let Some(max_rps) = config.max_rps {
            client = client.with_rate_limiter(Arc::new(rate_limiter(max_rps)));
        }

        Ok(Self { config, client })
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        self.client.metrics()
    }

    #[instrument(name = "driver", skip_all, fields(target = self.client.base_url()))]
    pub async fn run(self) -> RunStatistics {
        let total = self.config.total_duration();
        info!(
            "Running {} stages over {} (max {} virtual users)",
            self.config.stages.len(),
            humantime::format_duration(total),
            self.config.max_target(),
        );

        let start = Instant::now();
        let mut users = VirtualUsers::new(self.client, self.config.think_time);

        let mut ticker = interval(RAMP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }

            let target = target_vus(&self.config.stages, elapsed);
            if target != users.concurrency() {
                debug!("Adjusting virtual users {} -> {target}", users.concurrency());
                users.set_concurrency(target);
            }
        }

        let (max_vus, vus_started) = (users.max_vus, users.started);
        users.shutdown(self.config.graceful_stop).await;

        let elapsed = start.elapsed();
        info!("Load test complete after {}", humantime::format_duration(elapsed));

        RunStatistics {
            elapsed,
            max_vus,
            vus_started,
        }
    }
}

/// Target virtual user count `elapsed` into the schedule, ramping linearly from the previous
/// stage's target (starting at 0). Past the end of the schedule the last target holds.
pub fn target_vus(stages: &[Stage], elapsed: Duration) -> usize {
    let mut from = 0;
    let mut offset = Duration::ZERO;

    for stage in stages {
        let end = offset + stage.duration;
        if elapsed < end {
            let progress = (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
            let value = from as f64 + (stage.target as f64 - from as f64) * progress;
            return value.round() as usize;
        }

        from = stage.target;
        offset = end;
    }

    from
}

struct VirtualUser {
    stop: StopHandle,
    handle: JoinHandle<()>,
}

struct VirtualUsers {
    client: ApiClient,
    think_time: Duration,
    active: Vec<VirtualUser>,
    stopping: Vec<JoinHandle<()>>,
    started: usize,
    max_vus: usize,
}

impl VirtualUsers {
    fn new(client: ApiClient, think_time: Duration) -> Self {
        Self {
            client,
            think_time,
            active: vec![],
            stopping: vec![],
            started: 0,
            max_vus: 0,
        }
    }

    fn concurrency(&self) -> usize {
        self.active.len()
    }

    fn set_concurrency(&mut self, concurrency: usize) {
        if self.active.len() > concurrency {
            for user in self.active.drain(concurrency..) {
                user.stop.stop();
                self.stopping.push(user.handle);
            }
        } else {
            while self.active.len() < concurrency {
                let user = self.spawn();
                self.active.push(user);
            }
        }

        self.max_vus = self.max_vus.max(self.active.len());
        self.stopping.retain(|handle| !handle.is_finished());
    }

    fn spawn(&mut self) -> VirtualUser {
        self.started += 1;
        let vu = self.started as u64;

        let (stop, mut signal) = StopSignal::channel();
        let mut scenario =
            WorkloadScenario::new(vu, self.client.clone()).think_time(self.think_time);

        let handle = tokio::spawn(
            async move {
                while !signal.is_stopped() {
                    let report = scenario.run(&mut signal).await;
                    if report.stopped {
                        break;
                    }
                }
                trace!("Stopped after {} iterations", scenario.iterations());
            }
            .instrument(info_span!("vu", vu)),
        );

        VirtualUser { stop, handle }
    }

    async fn shutdown(mut self, grace: Duration) {
        for user in self.active.drain(..) {
            user.stop.stop();
            self.stopping.push(user.handle);
        }

        let deadline = Instant::now() + grace;
        let mut aborted = 0;
        for mut handle in self.stopping.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("Virtual user task failed: {err}"),
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            warn!("{aborted} virtual users did not stop within {grace:?} and were aborted");
        }
    }
}
