//! Runs one worker per station and waits for all of them.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::worker::{StationWorker, WorkerReport};
use crate::recorder::Recorder;
use crate::utils::clock::{Wake, sleep_for};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Delay between starting consecutive workers.
    pub stagger_delay: Duration,
    /// Pause before a worker whose schedule is unavailable tries again.
    pub degraded_retry_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stagger_delay: Duration::from_secs(3),
            degraded_retry_delay: Duration::from_secs(60),
        }
    }
}

/// How the supervised workers ended.
#[derive(Debug, Default)]
pub struct SupervisorReport {
    pub workers: Vec<WorkerReport>,
    /// Workers that panicked.
    pub crashed: usize,
    /// Recorders never started because shutdown came first.
    pub not_started: usize,
}

pub struct Supervisor {
    config: SupervisorConfig,
    cancellation_token: CancellationToken,
    tasks: JoinSet<WorkerReport>,
}

impl Supervisor {
    pub fn new(cancellation_token: CancellationToken, config: SupervisorConfig) -> Self {
        Self {
            config,
            cancellation_token,
            tasks: JoinSet::new(),
        }
    }

    /// Start a worker per recorder, `stagger_delay` apart, then wait until
    /// every worker has exited. Workers only exit once the token is cancelled.
    pub async fn run(mut self, recorders: Vec<Recorder>) -> SupervisorReport {
        let mut report = SupervisorReport::default();
        let total = recorders.len();
        info!(stations = total, "Starting workers");

        for (i, recorder) in recorders.into_iter().enumerate() {
            if i > 0
                && sleep_for(self.config.stagger_delay, &self.cancellation_token).await
                    == Wake::Cancelled
            {
                report.not_started = total - i;
                break;
            }

            let worker = StationWorker::new(
                recorder,
                self.config.degraded_retry_delay,
                self.cancellation_token.child_token(),
            );
            self.tasks.spawn(worker.run());
        }

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(worker) => {
                    debug!(station = %worker.station, "Worker joined");
                    report.workers.push(worker);
                }
                Err(e) if e.is_panic() => {
                    error!(error = %e, "Worker crashed");
                    report.crashed += 1;
                }
                Err(e) => {
                    debug!(error = %e, "Worker task cancelled");
                }
            }
        }

        info!(
            workers = report.workers.len(),
            crashed = report.crashed,
            "All workers stopped"
        );
        report
    }
}
