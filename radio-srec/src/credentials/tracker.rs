//! Consecutive refresh failure tracking.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Snapshot of the current failure streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureInfo {
    /// Number of consecutive failures.
    pub count: u32,
    /// Time of first failure in this sequence.
    pub first_failure: DateTime<Utc>,
}

/// Tracks consecutive refresh failures for one provider.
///
/// Used to escalate log severity after repeated failures.
#[derive(Default)]
pub struct RefreshFailureTracker {
    record: Mutex<Option<FailureInfo>>,
}

impl RefreshFailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure at `now` and return the updated streak.
    pub fn record_failure(&self, now: DateTime<Utc>) -> FailureInfo {
        let mut record = self.record.lock();
        let entry = record.get_or_insert(FailureInfo {
            count: 0,
            first_failure: now,
        });
        entry.count += 1;
        *entry
    }

    /// Clear failures on success.
    pub fn clear(&self) {
        self.record.lock().take();
    }

    pub fn failure_count(&self) -> u32 {
        self.record.lock().as_ref().map(|r| r.count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_failures_accumulate_and_clear() {
        let tracker = RefreshFailureTracker::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::minutes(1);

        assert_eq!(tracker.failure_count(), 0);
        assert_eq!(tracker.record_failure(t0).count, 1);

        let info = tracker.record_failure(t1);
        assert_eq!(info.count, 2);
        assert_eq!(info.first_failure, t0);

        tracker.clear();
        assert_eq!(tracker.failure_count(), 0);
        assert_eq!(tracker.record_failure(t1).first_failure, t1);
    }
}
