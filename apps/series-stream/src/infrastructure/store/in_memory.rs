//! In-process sample store.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{SampleStore, StoreError};
use crate::domain::sample::Sample;

/// Keeps every appended sample in memory, in append order.
#[derive(Debug, Default)]
pub struct InMemorySampleStore {
    samples: RwLock<Vec<Sample>>,
}

impl InMemorySampleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all stored samples.
    #[must_use]
    pub fn samples(&self) -> Vec<Sample> {
        self.samples.read().clone()
    }

    /// Number of stored samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

#[async_trait]
impl SampleStore for InMemorySampleStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.samples.write().push(*sample);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
