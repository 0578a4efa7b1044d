//! Schedule traversal for one station.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stations_parser::{Program, StationError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::clock::Clock;

/// Where a station's schedule comes from.
#[async_trait]
pub trait ScheduleFeed: Send + Sync {
    /// Fetch the current schedule, ordered by start time.
    async fn fetch_schedule(&self) -> Result<Vec<Program>, StationError>;
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("schedule fetch failed after {attempts} attempts: {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: StationError,
    },
    #[error("no upcoming program after {refetches} refetches")]
    Exhausted { refetches: u32 },
}

#[derive(Debug, Clone)]
pub struct CursorConfig {
    pub max_fetch_attempts: u32,
    pub fetch_retry_delay: Duration,
    /// Refetches in a row that may produce no upcoming program before the
    /// cursor gives up.
    pub max_empty_refetches: u32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            max_fetch_attempts: 3,
            fetch_retry_delay: Duration::from_secs(30),
            max_empty_refetches: 3,
        }
    }
}

/// Walks a schedule snapshot and refetches it once every entry was consumed.
pub struct ProgramCursor<F> {
    station: String,
    feed: F,
    clock: Arc<dyn Clock>,
    config: CursorConfig,
    schedule: Vec<Program>,
    index: usize,
    fetched: bool,
}

impl<F: ScheduleFeed> ProgramCursor<F> {
    pub fn new(
        station: impl Into<String>,
        feed: F,
        clock: Arc<dyn Clock>,
        config: CursorConfig,
    ) -> Self {
        Self {
            station: station.into(),
            feed,
            clock,
            config,
            schedule: Vec::new(),
            index: 0,
            fetched: false,
        }
    }

    /// Seed the cursor with an already fetched schedule.
    pub fn with_schedule(mut self, schedule: Vec<Program>) -> Self {
        self.replace_schedule(schedule);
        self
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Position in the current snapshot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The earliest program of the snapshot, at or after the current position,
    /// that has not ended yet.
    pub async fn next_program(&mut self) -> Result<Program, CursorError> {
        if !self.fetched {
            self.refetch().await?;
        }

        let mut empty_refetches = 0;
        loop {
            let now = self.clock.now();
            while let Some(program) = self.schedule.get(self.index) {
                self.index += 1;
                if !program.has_ended(now) {
                    return Ok(program.clone());
                }
            }

            if empty_refetches >= self.config.max_empty_refetches {
                warn!(
                    station = %self.station,
                    refetches = empty_refetches,
                    "Schedule has no upcoming program"
                );
                return Err(CursorError::Exhausted {
                    refetches: empty_refetches,
                });
            }
            empty_refetches += 1;
            self.refetch().await?;
        }
    }

    async fn refetch(&mut self) -> Result<(), CursorError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.feed.fetch_schedule().await {
                Ok(schedule) => {
                    debug!(station = %self.station, programs = schedule.len(), "Fetched schedule");
                    self.replace_schedule(schedule);
                    return Ok(());
                }
                Err(e) if attempt < self.config.max_fetch_attempts => {
                    warn!(
                        station = %self.station,
                        attempt,
                        error = %e,
                        "Schedule fetch failed, retrying in {:?}",
                        self.config.fetch_retry_delay
                    );
                    tokio::time::sleep(self.config.fetch_retry_delay).await;
                }
                Err(e) => {
                    return Err(CursorError::Fetch {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    fn replace_schedule(&mut self, mut schedule: Vec<Program>) {
        schedule.sort_by_key(|p| p.start());
        self.schedule = schedule;
        self.index = 0;
        self.fetched = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::InstantClock;
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn program(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Program {
        Program::new(title, start, end).unwrap()
    }

    /// Serves queued responses, repeating the last one when the queue runs dry.
    struct ScriptedFeed {
        responses: Mutex<VecDeque<Result<Vec<Program>, StationError>>>,
        last: Mutex<Vec<Program>>,
        fetches: AtomicU32,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<Result<Vec<Program>, StationError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(Vec::new()),
                fetches: AtomicU32::new(0),
            }
        }

        fn fetches(&self) -> u32 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScheduleFeed for ScriptedFeed {
        async fn fetch_schedule(&self) -> Result<Vec<Program>, StationError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().pop_front() {
                Some(Ok(schedule)) => {
                    *self.last.lock() = schedule.clone();
                    Ok(schedule)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last.lock().clone()),
            }
        }
    }

    fn make_cursor(origin: DateTime<Utc>, feed: ScriptedFeed) -> ProgramCursor<ScriptedFeed> {
        ProgramCursor::new(
            "TBSラジオ",
            feed,
            Arc::new(InstantClock::new(origin)),
            CursorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_ended_programs() {
        let p1 = program("P1", at(0, 0), at(1, 0));
        let p2 = program("P2", at(1, 0), at(2, 0));
        let mut cursor = make_cursor(at(1, 30), ScriptedFeed::new(vec![Ok(vec![p1, p2.clone()])]));

        assert_eq!(cursor.next_program().await.unwrap(), p2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetches_once_after_exhausting_snapshot() {
        let p1 = program("P1", at(0, 0), at(1, 0));
        let p2 = program("P2", at(1, 0), at(2, 0));
        let p3 = program("P3", at(2, 0), at(3, 0));
        let p4 = program("P4", at(3, 0), at(4, 0));
        let feed = ScriptedFeed::new(vec![
            Ok(vec![p1.clone(), p2.clone()]),
            Ok(vec![p3.clone(), p4]),
        ]);
        let mut cursor = make_cursor(at(0, 30), feed);

        assert_eq!(cursor.next_program().await.unwrap(), p1);
        assert_eq!(cursor.next_program().await.unwrap(), p2);
        assert_eq!(cursor.feed().fetches(), 1);

        assert_eq!(cursor.next_program().await.unwrap(), p3);
        assert_eq!(cursor.feed().fetches(), 2);
        assert_eq!(cursor.index(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_when_feed_never_has_future_programs() {
        let stale = program("P0", at(0, 0), at(1, 0));
        let feed = ScriptedFeed::new(vec![Ok(vec![stale])]);
        let mut cursor = make_cursor(at(5, 0), feed);

        let err = cursor.next_program().await.unwrap_err();
        assert!(matches!(err, CursorError::Exhausted { refetches: 3 }));
        // initial fetch + bounded refetches
        assert_eq!(cursor.feed().fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failures_are_retried_then_surfaced() {
        let p1 = program("P1", at(0, 0), at(1, 0));
        let feed = ScriptedFeed::new(vec![
            Err(StationError::NotAuthorized),
            Ok(vec![p1.clone()]),
        ]);
        let mut cursor = make_cursor(at(0, 10), feed);
        assert_eq!(cursor.next_program().await.unwrap(), p1);
        assert_eq!(cursor.feed().fetches(), 2);

        let feed = ScriptedFeed::new(vec![
            Err(StationError::NotAuthorized),
            Err(StationError::NotAuthorized),
            Err(StationError::NotAuthorized),
        ]);
        let mut cursor = make_cursor(at(0, 10), feed);
        let err = cursor.next_program().await.unwrap_err();
        assert!(matches!(err, CursorError::Fetch { attempts: 3, .. }));
    }
}
