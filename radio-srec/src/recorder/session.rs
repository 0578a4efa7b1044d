//! Recording of a single program.
//!
//! ```text
//! WaitForStart -> Connecting -> Streaming -> Completed
//!                     ^            |
//!                     +------------+  (read failure)
//!                     |
//!                     +-> Aborted     (attempts exhausted, sink failure)
//! ```
//!
//! Every suspension point also races the cancellation token and ends the
//! session as `Cancelled`. One attempt counter covers both connect failures
//! and dropped connections for the whole program.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stations_parser::Program;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::sink::{OutputSink, SinkFactory};
use super::transport::{TransportConnector, TransportError, TransportStream};
use crate::station::{CursorError, StreamSource};
use crate::utils::clock::{Clock, Wake, sleep_for, sleep_until, until};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Connection attempts per program, counting reconnects after a drop.
    pub max_attempts: u32,
    /// Pause after a failed connect before the next attempt.
    pub retry_backoff: Duration,
    pub read_chunk_size: usize,
    /// Stop recording after this long regardless of the program end.
    pub debug_record_limit: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_backoff: Duration::from_secs(10),
            read_chunk_size: 1024,
            debug_record_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitForStart,
    Connecting,
    Streaming,
    Completed,
    Aborted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The output file could not be created.
    Sink(String),
    /// Every connection attempt failed or dropped.
    RetriesExhausted { attempts: u32 },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sink(e) => write!(f, "output unavailable: {e}"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} connection attempts")
            }
        }
    }
}

#[derive(Debug)]
pub enum SessionOutcome {
    /// Recorded until the program end (or the debug limit).
    Completed { program: Program, bytes: u64 },
    /// A placeholder slot; waited it out without recording.
    OffAir { program: Program },
    /// Gave up on the program and waited for its end.
    Aborted { program: Program, reason: AbortReason },
    /// No program could be obtained from the schedule.
    ScheduleUnavailable(CursorError),
    Cancelled,
}

/// Attempt counter for one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Count a failure; returns `true` once no attempts are left.
    pub fn record_failure(&mut self) -> bool {
        self.attempts += 1;
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Collaborators shared by every session of every station.
pub struct RecordingContext {
    pub transport: Arc<dyn TransportConnector>,
    pub sinks: Arc<dyn SinkFactory>,
    pub clock: Arc<dyn Clock>,
    pub config: SessionConfig,
}

/// Drives one program through the state machine.
pub struct RecordingSession<'a> {
    station: &'a mut dyn StreamSource,
    ctx: &'a RecordingContext,
    cancel: &'a CancellationToken,
    state: SessionState,
}

enum Step {
    Cancelled,
    Deadline,
    Read(Result<usize, TransportError>),
}

/// When streaming stops: the program end, or earlier under a debug limit.
/// A limit too large to add to `now` leaves the program end in place.
fn stop_at(now: DateTime<Utc>, end: DateTime<Utc>, limit: Option<Duration>) -> DateTime<Utc> {
    limit
        .and_then(|limit| chrono::Duration::from_std(limit).ok())
        .and_then(|limit| now.checked_add_signed(limit))
        .map_or(end, |limit_end| limit_end.min(end))
}

/// Terminal result of the connect/stream loop.
enum Finish {
    Completed,
    Aborted(AbortReason),
    Cancelled,
}

impl<'a> RecordingSession<'a> {
    pub fn new(
        station: &'a mut dyn StreamSource,
        ctx: &'a RecordingContext,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            station,
            ctx,
            cancel,
            state: SessionState::WaitForStart,
        }
    }

    pub async fn run(mut self) -> SessionOutcome {
        let station = self.station.display_name().to_string();

        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            next = self.station.next_program() => Some(next),
        };
        let program = match next {
            None => return self.cancelled(),
            Some(Ok(program)) => program,
            Some(Err(e)) => return SessionOutcome::ScheduleUnavailable(e),
        };

        if let Some(marker) = self.station.off_air_marker()
            && program.title().contains(marker)
        {
            info!(
                station = %station,
                program = %program.title(),
                until = %program.end(),
                "Off air, skipping"
            );
            return match sleep_until(self.ctx.clock.as_ref(), program.end(), self.cancel).await {
                Wake::Cancelled => self.cancelled(),
                Wake::Elapsed => {
                    self.transition(SessionState::Completed);
                    SessionOutcome::OffAir { program }
                }
            };
        }

        if program.is_upcoming(self.ctx.clock.now()) {
            info!(
                station = %station,
                program = %program.title(),
                start = %program.start(),
                "Waiting for program start"
            );
            if sleep_until(self.ctx.clock.as_ref(), program.start(), self.cancel).await
                == Wake::Cancelled
            {
                return self.cancelled();
            }
        }

        let mut sink = match self.ctx.sinks.create(&station, &program).await {
            Ok(sink) => sink,
            Err(e) => {
                error!(station = %station, program = %program.title(), error = %e, "Cannot create output");
                return self
                    .abort(&station, program, AbortReason::Sink(e.to_string()))
                    .await;
            }
        };

        let stop_at = stop_at(
            self.ctx.clock.now(),
            program.end(),
            self.ctx.config.debug_record_limit,
        );

        info!(
            station = %station,
            program = %program.title(),
            minutes = program.duration().num_minutes(),
            output = %sink.describe(),
            "Recording"
        );
        let (finish, bytes) = self
            .record(&station, &program, stop_at, sink.as_mut())
            .await;

        if let Err(e) = sink.finish().await {
            warn!(station = %station, output = %sink.describe(), error = %e, "Failed to finalize output");
        }

        match finish {
            Finish::Completed => {
                self.transition(SessionState::Completed);
                info!(station = %station, program = %program.title(), bytes, "Recording complete");
                SessionOutcome::Completed { program, bytes }
            }
            Finish::Aborted(reason) => self.abort(&station, program, reason).await,
            Finish::Cancelled => self.cancelled(),
        }
    }

    /// Connect/stream loop. Returns how it ended and the bytes written.
    ///
    /// No open transport means the session is connecting; an open one means
    /// it is streaming.
    async fn record(
        &mut self,
        station: &str,
        program: &Program,
        stop_at: DateTime<Utc>,
        sink: &mut dyn OutputSink,
    ) -> (Finish, u64) {
        let ctx = self.ctx;
        let clock = ctx.clock.as_ref();
        let config = &ctx.config;
        let mut retry = RetryState::new(config.max_attempts);
        let mut buf = vec![0u8; config.read_chunk_size.max(1)];
        let mut bytes: u64 = 0;
        let mut transport: Option<Box<dyn TransportStream>> = None;

        let finish = loop {
            let stream = match transport.as_mut() {
                Some(stream) => stream,
                None => {
                    self.transition(SessionState::Connecting);
                    if clock.now() >= stop_at {
                        break Finish::Completed;
                    }

                    match self.connect(station, program, retry.attempts).await {
                        Ok(Some(stream)) => {
                            info!(
                                station = %station,
                                program = %program.title(),
                                attempt = retry.attempts + 1,
                                "Connected"
                            );
                            transport = Some(stream);
                            self.transition(SessionState::Streaming);
                        }
                        Ok(None) => break Finish::Cancelled,
                        Err(e) => {
                            let exhausted = retry.record_failure();
                            warn!(
                                station = %station,
                                program = %program.title(),
                                attempt = retry.attempts,
                                max_attempts = retry.max_attempts,
                                error = %e,
                                "Connect failed"
                            );
                            if exhausted {
                                break Finish::Aborted(AbortReason::RetriesExhausted {
                                    attempts: retry.attempts,
                                });
                            }
                            if sleep_for(config.retry_backoff, self.cancel).await
                                == Wake::Cancelled
                            {
                                break Finish::Cancelled;
                            }
                        }
                    }
                    continue;
                }
            };

            let remaining = until(clock, stop_at);
            if remaining.is_zero() {
                break Finish::Completed;
            }

            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                _ = tokio::time::sleep(remaining) => Step::Deadline,
                read = stream.read(&mut buf) => Step::Read(read),
            };

            match step {
                Step::Cancelled => break Finish::Cancelled,
                Step::Deadline => {}
                Step::Read(Ok(n)) if n > 0 => {
                    if let Err(e) = sink.write_chunk(&buf[..n]).await {
                        warn!(
                            station = %station,
                            output = %sink.describe(),
                            bytes = n,
                            error = %e,
                            "Write failed, chunk dropped"
                        );
                    } else {
                        bytes += n as u64;
                    }
                }
                Step::Read(result) => {
                    if let Some(mut stream) = transport.take() {
                        stream.close().await;
                    }
                    let exhausted = retry.record_failure();
                    match result {
                        Err(e) => warn!(
                            station = %station,
                            program = %program.title(),
                            attempt = retry.attempts,
                            error = %e,
                            "Stream dropped"
                        ),
                        Ok(_) => warn!(
                            station = %station,
                            program = %program.title(),
                            attempt = retry.attempts,
                            "Stream ended early"
                        ),
                    }
                    if exhausted {
                        break Finish::Aborted(AbortReason::RetriesExhausted {
                            attempts: retry.attempts,
                        });
                    }
                }
            }
        };

        if let Some(mut stream) = transport.take() {
            stream.close().await;
        }
        (finish, bytes)
    }

    /// One connection attempt. `Ok(None)` means cancelled.
    async fn connect(
        &mut self,
        station: &str,
        program: &Program,
        failures: u32,
    ) -> Result<Option<Box<dyn TransportStream>>, String> {
        if failures > 0 {
            let refreshed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                r = self.station.refresh() => r,
            };
            match refreshed {
                Ok(outcome) => debug!(station = %station, ?outcome, "Credential check"),
                Err(e) => warn!(
                    station = %station,
                    program = %program.title(),
                    error = %e,
                    "Credential refresh failed, connecting anyway"
                ),
            }
        }

        let locator = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            l = self.station.stream_locator() => l.map_err(|e| e.to_string())?,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            c = self.ctx.transport.connect(&locator) => c.map(Some).map_err(|e| e.to_string()),
        }
    }

    /// Wait out the rest of the program so the next session starts with the
    /// following one.
    async fn abort(&mut self, station: &str, program: Program, reason: AbortReason) -> SessionOutcome {
        error!(
            station = %station,
            program = %program.title(),
            reason = %reason,
            until = %program.end(),
            "Program abandoned"
        );
        match sleep_until(self.ctx.clock.as_ref(), program.end(), self.cancel).await {
            Wake::Cancelled => self.cancelled(),
            Wake::Elapsed => {
                self.transition(SessionState::Aborted);
                SessionOutcome::Aborted { program, reason }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Session state");
            self.state = next;
        }
    }

    fn cancelled(&mut self) -> SessionOutcome {
        self.transition(SessionState::Cancelled);
        SessionOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retry_state_exhausts_at_max() {
        let mut retry = RetryState::new(4);
        assert!(!retry.record_failure());
        assert!(!retry.record_failure());
        assert!(!retry.record_failure());
        assert!(retry.record_failure());
        assert_eq!(retry.attempts, 4);
    }

    #[test]
    fn test_stop_at_honours_debug_limit() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = now + chrono::Duration::hours(1);

        assert_eq!(stop_at(now, end, None), end);
        assert_eq!(
            stop_at(now, end, Some(Duration::from_secs(60))),
            now + chrono::Duration::minutes(1)
        );
        assert_eq!(stop_at(now, end, Some(Duration::from_secs(7200))), end);
    }

    #[test]
    fn test_stop_at_huge_limit_falls_back_to_end() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = now + chrono::Duration::hours(1);

        assert_eq!(stop_at(now, end, Some(Duration::from_secs(u64::MAX))), end);
        assert_eq!(stop_at(now, end, Some(Duration::MAX)), end);
        // representable as a delta, but past the last representable instant
        let far = Duration::from_secs(i64::MAX as u64 / 1000);
        assert_eq!(stop_at(now, end, Some(far)), end);
    }

    #[test]
    fn test_abort_reason_display() {
        let reason = AbortReason::RetriesExhausted { attempts: 4 };
        assert_eq!(reason.to_string(), "gave up after 4 connection attempts");
    }
}
