//! Sample Broadcaster
//!
//! Fans a serialized sample out to every attached subscriber.
//!
//! # Failure Isolation
//!
//! Each subscriber's send yields its own `Result`. The broadcaster folds
//! over those results and evicts every subscriber that failed or timed out.
//! One bad subscriber never blocks delivery to the others and `publish`
//! never surfaces an error to the generation loop.
//!
//! Sends run concurrently and each is bounded by `send_timeout`, so a hung
//! peer delays a publish by at most one timeout.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::application::ports::{ChannelError, SharedSubscriber, SubscriberSink};
use crate::domain::subscription::{SubscriberId, SubscriberRegistry};
use crate::infrastructure::metrics;
use crate::BroadcastSettings;

/// Registry of live-stream subscribers.
pub type LiveRegistry = SubscriberRegistry<SharedSubscriber>;

/// Shared registry reference.
pub type SharedRegistry = Arc<LiveRegistry>;

// =============================================================================
// Configuration
// =============================================================================

/// Broadcaster configuration.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Upper bound on a single subscriber send.
    pub send_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            send_timeout: settings.send_timeout,
        }
    }
}

// =============================================================================
// Broadcaster
// =============================================================================

/// Outcome of one `publish` call. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the message.
    pub delivered: usize,
    /// Subscribers whose send failed or timed out.
    pub failed: usize,
    /// Failed subscribers removed from the registry by this call.
    pub evicted: usize,
}

/// Delivers messages to every subscriber in the registry.
#[derive(Debug)]
pub struct Broadcaster {
    registry: SharedRegistry,
    config: BroadcastConfig,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    #[must_use]
    pub const fn new(registry: SharedRegistry, config: BroadcastConfig) -> Self {
        Self { registry, config }
    }

    /// The registry this broadcaster reads from.
    #[must_use]
    pub const fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Send `message` to every subscriber in the current snapshot.
    ///
    /// Failed subscribers are detached and closed.
    pub async fn publish(&self, message: &str) -> BroadcastReport {
        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let timeout = self.config.send_timeout;
        let results = join_all(snapshot.into_iter().map(|(id, subscriber)| async move {
            let result = deliver(subscriber.as_ref(), message, timeout).await;
            (id, subscriber, result)
        }))
        .await;

        let mut report = BroadcastReport::default();
        let mut evicted: Vec<(SubscriberId, SharedSubscriber)> = Vec::new();

        for (id, subscriber, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(subscriber_id = %id, error = %e, "Subscriber send failed, evicting");
                    if self.registry.detach(id) {
                        evicted.push((id, subscriber));
                    }
                }
            }
        }

        report.evicted = evicted.len();

        if !evicted.is_empty() {
            join_all(evicted.iter().map(|(id, subscriber)| async move {
                if tokio::time::timeout(timeout, subscriber.close()).await.is_err() {
                    tracing::debug!(subscriber_id = %id, "Timed out closing evicted subscriber");
                }
            }))
            .await;
            metrics::record_subscribers_evicted(report.evicted as u64);
            metrics::set_subscribers(self.registry.len());
        }

        metrics::record_messages_delivered(report.delivered as u64);
        report
    }
}

async fn deliver(
    subscriber: &dyn SubscriberSink,
    message: &str,
    timeout: Duration,
) -> Result<(), ChannelError> {
    tokio::time::timeout(timeout, subscriber.send(message))
        .await
        .unwrap_or(Err(ChannelError::Timeout(timeout.as_millis())))
}

// =============================================================================
// Tests
// =============================================================================
