//! Port Interfaces
//!
//! Contracts the infrastructure adapters implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SampleStore`: append-only time-series persistence
//! - `SubscriberSink`: one connected live-stream observer

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::sample::Sample;

// =============================================================================
// Sample Store
// =============================================================================

/// Append-only persistence for samples.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Persist one sample.
    async fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// Trivial liveness query used by the readiness protocol.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Shared store reference.
pub type SharedSampleStore = Arc<dyn SampleStore>;

/// Store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but rejected the write.
    #[error("failed to persist sample: {0}")]
    Write(String),

    /// Schema bootstrap failed.
    #[error("schema bootstrap failed: {0}")]
    Schema(String),
}

// =============================================================================
// Subscriber Sink
// =============================================================================

/// A connected observer that accepts text messages.
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Deliver one text message.
    async fn send(&self, message: &str) -> Result<(), ChannelError>;

    /// Close the channel. Errors are ignored; the subscriber is gone either way.
    async fn close(&self);
}

/// Shared subscriber handle, as stored in the registry.
pub type SharedSubscriber = Arc<dyn SubscriberSink>;

/// Per-subscriber delivery errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The peer has gone away.
    #[error("channel closed")]
    Closed,

    /// The send did not complete within the configured timeout.
    #[error("send timed out after {0} ms")]
    Timeout(u128),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

// =============================================================================
// Test Doubles
// =============================================================================

#[cfg(test)]
mockall::mock! {
    pub Store {}

    #[async_trait]
    impl SampleStore for Store {
        async fn append(&self, sample: &Sample) -> Result<(), StoreError>;
        async fn ping(&self) -> Result<(), StoreError>;
    }
}
