//! Per-provider credential refresh deduplication.
//!
//! Every station of a provider shares one [`CredentialRefreshCoordinator`].
//! When several stations lose their connection at the same time they all
//! ask for a refresh; the first caller runs it and the rest wait on the lock,
//! then see a fresh timestamp and return without calling the provider again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::error::CredentialError;
use super::tracker::RefreshFailureTracker;
use crate::utils::clock::Clock;

/// The expensive operation that mints a new credential for a provider.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), CredentialError>;
}

/// Result of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call ran the refresh and it succeeded.
    Refreshed,
    /// The credential was refreshed recently; nothing was done.
    Fresh,
    /// The provider has no credential to refresh.
    NotRequired,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// A credential refreshed less than this long ago is considered fresh.
    pub staleness_window: Duration,
    /// Consecutive failures after which each failure is logged as an error.
    pub escalation_threshold: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            staleness_window: Duration::from_secs(600),
            escalation_threshold: 3,
        }
    }
}

#[derive(Debug, Default)]
struct RefreshState {
    last_refreshed_at: Option<DateTime<Utc>>,
}

pub struct CredentialRefreshCoordinator {
    provider: String,
    refresher: Arc<dyn CredentialRefresher>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    state: Mutex<RefreshState>,
    failures: RefreshFailureTracker,
}

impl CredentialRefreshCoordinator {
    pub fn new(
        provider: impl Into<String>,
        refresher: Arc<dyn CredentialRefresher>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            provider: provider.into(),
            refresher,
            clock,
            config,
            state: Mutex::new(RefreshState::default()),
            failures: RefreshFailureTracker::new(),
        }
    }

    /// Refresh the credential unless another caller did so within the
    /// staleness window.
    ///
    /// Callers arriving while a refresh is running wait for it and then
    /// re-check staleness. A failed refresh leaves the timestamp untouched so
    /// the next caller tries again.
    pub async fn request_refresh(&self) -> Result<RefreshOutcome, CredentialError> {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_refreshed_at
            && !self.is_stale(last)
        {
            debug!(provider = %self.provider, last_refreshed_at = %last, "Credential still fresh");
            return Ok(RefreshOutcome::Fresh);
        }

        info!(provider = %self.provider, "Refreshing credential");
        match self.refresher.refresh().await {
            Ok(()) => {
                let now = self.clock.now();
                state.last_refreshed_at = Some(now);
                self.failures.clear();
                info!(provider = %self.provider, "Credential refreshed");
                Ok(RefreshOutcome::Refreshed)
            }
            Err(e) => {
                let streak = self.failures.record_failure(self.clock.now());
                if streak.count >= self.config.escalation_threshold {
                    error!(
                        provider = %self.provider,
                        consecutive_failures = streak.count,
                        failing_since = %streak.first_failure,
                        error = %e,
                        "Credential refresh keeps failing; recordings for this provider will be lost"
                    );
                } else {
                    warn!(
                        provider = %self.provider,
                        consecutive_failures = streak.count,
                        transient = e.is_transient(),
                        error = %e,
                        "Credential refresh failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Record a refresh that happened outside the coordinator, such as the
    /// initial authorization at start-up.
    pub async fn mark_refreshed(&self) {
        let mut state = self.state.lock().await;
        state.last_refreshed_at = Some(self.clock.now());
        self.failures.clear();
    }

    pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_refreshed_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.failure_count()
    }

    fn is_stale(&self, last: DateTime<Utc>) -> bool {
        let age = (self.clock.now() - last).to_std().unwrap_or(Duration::ZERO);
        age >= self.config.staleness_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::InstantClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRefresher {
        calls: AtomicU32,
        fail_first: u32,
        latency: Duration,
    }

    impl CountingRefresher {
        fn new(fail_first: u32, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_first,
                latency,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialRefresher for CountingRefresher {
        async fn refresh(&self) -> Result<(), CredentialError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.latency).await;
            if call <= self.fail_first {
                return Err(CredentialError::RefreshFailed(format!("attempt {call}")));
            }
            Ok(())
        }
    }

    fn coordinator(refresher: Arc<CountingRefresher>) -> Arc<CredentialRefreshCoordinator> {
        let clock = Arc::new(InstantClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap(),
        ));
        Arc::new(CredentialRefreshCoordinator::new(
            "radiko",
            refresher,
            clock,
            CoordinatorConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_within_window_refresh_once() {
        let refresher = CountingRefresher::new(0, Duration::ZERO);
        let coordinator = coordinator(refresher.clone());

        assert_eq!(
            coordinator.request_refresh().await.unwrap(),
            RefreshOutcome::Refreshed
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            coordinator.request_refresh().await.unwrap(),
            RefreshOutcome::Fresh
        );
        assert_eq!(refresher.calls(), 1);

        tokio::time::sleep(Duration::from_secs(11 * 60)).await;
        assert_eq!(
            coordinator.request_refresh().await.unwrap(),
            RefreshOutcome::Refreshed
        );
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_refresh() {
        let refresher = CountingRefresher::new(0, Duration::from_secs(5));
        let coordinator = coordinator(refresher.clone());

        let mut handles = Vec::new();
        for _ in 0..6 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(
                async move { coordinator.request_refresh().await },
            ));
        }

        let mut refreshed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == RefreshOutcome::Refreshed {
                refreshed += 1;
            }
        }

        assert_eq!(refreshed, 1);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_leaves_timestamp_and_next_caller_retries() {
        let refresher = CountingRefresher::new(3, Duration::ZERO);
        let coordinator = coordinator(refresher.clone());

        for expected in 1..=3 {
            assert!(coordinator.request_refresh().await.is_err());
            assert_eq!(coordinator.consecutive_failures(), expected);
            assert!(coordinator.last_refreshed_at().await.is_none());
        }

        assert_eq!(
            coordinator.request_refresh().await.unwrap(),
            RefreshOutcome::Refreshed
        );
        assert_eq!(coordinator.consecutive_failures(), 0);
        assert_eq!(refresher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_refreshed_counts_as_fresh() {
        let refresher = CountingRefresher::new(0, Duration::ZERO);
        let coordinator = coordinator(refresher.clone());

        coordinator.mark_refreshed().await;
        assert_eq!(
            coordinator.request_refresh().await.unwrap(),
            RefreshOutcome::Fresh
        );
        assert_eq!(refresher.calls(), 0);
    }
}
