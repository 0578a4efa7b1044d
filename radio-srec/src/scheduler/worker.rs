//! The endless per-station loop.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::recorder::{Recorder, SessionOutcome};
use crate::utils::clock::{Wake, sleep_for};

/// Session counts of one worker, returned when it stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub station: String,
    pub completed: u64,
    pub off_air: u64,
    pub aborted: u64,
    pub schedule_unavailable: u64,
}

impl WorkerReport {
    pub fn sessions(&self) -> u64 {
        self.completed + self.off_air + self.aborted + self.schedule_unavailable
    }
}

/// Records one station's programs back to back until cancelled.
pub struct StationWorker {
    recorder: Recorder,
    degraded_retry_delay: Duration,
    cancel: CancellationToken,
}

impl StationWorker {
    pub fn new(recorder: Recorder, degraded_retry_delay: Duration, cancel: CancellationToken) -> Self {
        Self {
            recorder,
            degraded_retry_delay,
            cancel,
        }
    }

    pub async fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport {
            station: self.recorder.station_name().to_string(),
            ..Default::default()
        };
        info!(station = %report.station, "Worker started");

        while !self.cancel.is_cancelled() {
            match self.recorder.record_next(&self.cancel).await {
                SessionOutcome::Completed { program, bytes } => {
                    debug!(station = %report.station, program = %program.title(), bytes, "Session completed");
                    report.completed += 1;
                }
                SessionOutcome::OffAir { .. } => report.off_air += 1,
                SessionOutcome::Aborted { .. } => report.aborted += 1,
                SessionOutcome::ScheduleUnavailable(e) => {
                    report.schedule_unavailable += 1;
                    warn!(
                        station = %report.station,
                        error = %e,
                        "Station degraded, schedule unavailable; retrying in {:?}",
                        self.degraded_retry_delay
                    );
                    if sleep_for(self.degraded_retry_delay, &self.cancel).await == Wake::Cancelled {
                        break;
                    }
                }
                SessionOutcome::Cancelled => break,
            }
        }

        info!(station = %report.station, sessions = report.sessions(), "Worker stopped");
        report
    }
}
