//! Wall-clock access and cancellable sleeps.
//!
//! Schedules are expressed in wall-clock time, while timers are driven by
//! tokio. Everything that compares against program boundaries reads the time
//! through [`Clock`], so the whole recording loop can also run under a paused
//! tokio runtime with [`InstantClock`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall clock anchored at `origin` that advances with tokio's monotonic
/// time, so `tokio::time::pause()` and auto-advance move it too.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl InstantClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or(chrono::Duration::MAX);
        self.origin + elapsed
    }
}

/// How a cancellable sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

/// Time remaining until `target`, zero when it has passed.
pub fn until(clock: &dyn Clock, target: DateTime<Utc>) -> Duration {
    (target - clock.now()).to_std().unwrap_or(Duration::ZERO)
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep_for(duration: Duration, cancel: &CancellationToken) -> Wake {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Wake::Cancelled
        } else {
            Wake::Elapsed
        };
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Wake::Cancelled,
        _ = tokio::time::sleep(duration) => Wake::Elapsed,
    }
}

/// Sleep until `target` on `clock` unless `cancel` fires first.
///
/// The remaining time is re-read after waking, so a clock that runs slightly
/// behind the timer never returns before `target`.
pub async fn sleep_until(
    clock: &dyn Clock,
    target: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Wake {
    loop {
        let remaining = until(clock, target);
        if remaining.is_zero() {
            return if cancel.is_cancelled() {
                Wake::Cancelled
            } else {
                Wake::Elapsed
            };
        }
        if sleep_for(remaining, cancel).await == Wake::Cancelled {
            return Wake::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_clock_follows_paused_time() {
        let clock = InstantClock::new(origin());
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), origin() + chrono::Duration::seconds(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_reaches_target() {
        let clock = InstantClock::new(origin());
        let target = origin() + chrono::Duration::minutes(30);
        let cancel = CancellationToken::new();

        assert_eq!(sleep_until(&clock, target, &cancel).await, Wake::Elapsed);
        assert!(clock.now() >= target);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_past_target_returns_immediately() {
        let clock = InstantClock::new(origin());
        let cancel = CancellationToken::new();
        let before = clock.now();

        let wake = sleep_until(&clock, origin() - chrono::Duration::hours(1), &cancel).await;
        assert_eq!(wake, Wake::Elapsed);
        assert_eq!(clock.now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_cancellable() {
        let clock = InstantClock::new(origin());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let wake = sleep_until(&clock, origin() + chrono::Duration::hours(2), &cancel).await;
        assert_eq!(wake, Wake::Cancelled);
        assert!(clock.now() < origin() + chrono::Duration::hours(2));
    }
}
