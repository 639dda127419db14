//! Store Readiness
//!
//! Bounded fixed-delay retry of `SampleStore::ping` before the service
//! starts accepting work.

use std::time::Duration;

use crate::application::ports::{SampleStore, StoreError};
use crate::StoreSettings;

/// Retry schedule for the readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Total ping attempts, including the first.
    pub attempts: u32,
    /// Pause between failed attempts.
    pub delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&StoreSettings> for ReadinessPolicy {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            attempts: settings.readiness_attempts.max(1),
            delay: settings.readiness_delay,
        }
    }
}

/// Ping `store` until it answers or the policy is exhausted.
///
/// Returns the attempt number that succeeded.
///
/// # Errors
///
/// Returns the last ping error once every attempt has failed.
pub async fn wait_until_ready(
    store: &dyn SampleStore,
    policy: ReadinessPolicy,
) -> Result<u32, StoreError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match store.ping().await {
            Ok(()) => {
                tracing::info!(attempt, "Store is ready");
                return Ok(attempt);
            }
            Err(e) if attempt >= attempts => {
                tracing::error!(attempts, error = %e, "Store did not become ready");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = policy.delay.as_millis(),
                    error = %e,
                    "Store not ready, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::application::ports::MockStore;

    fn flaky_store(failures: u32) -> (MockStore, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut store = MockStore::new();
        store.expect_ping().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < failures {
                Err(StoreError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        });
        (store, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_attempt() {
        let (store, calls) = flaky_store(0);
        let started = tokio::time::Instant::now();

        let attempt = wait_until_ready(&store, ReadinessPolicy::default()).await.unwrap();

        assert_eq!(attempt, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_retries_waits_between_attempts() {
        let (store, calls) = flaky_store(3);
        let started = tokio::time::Instant::now();

        let attempt = wait_until_ready(&store, ReadinessPolicy::default()).await.unwrap();

        assert_eq!(attempt, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_policy_returns_last_error_without_trailing_sleep() {
        let (store, calls) = flaky_store(u32::MAX);
        let policy = ReadinessPolicy {
            attempts: 3,
            delay: Duration::from_millis(500),
        };
        let started = tokio::time::Instant::now();

        let result = wait_until_ready(&store, policy).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_pings_once() {
        let (store, calls) = flaky_store(0);
        let policy = ReadinessPolicy {
            attempts: 0,
            delay: Duration::from_secs(1),
        };

        assert_eq!(wait_until_ready(&store, policy).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
