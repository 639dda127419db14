//! Sample Store Adapters
//!
//! - `PostgresSampleStore`: `TimescaleDB` / `PostgreSQL` via sqlx
//! - `InMemorySampleStore`: in-process store for local runs and tests
//!
//! `ConfiguredStore` picks one from `StoreSettings` and exposes the
//! adapter-specific bootstrap alongside the shared port.

mod in_memory;
mod postgres;

use std::sync::Arc;

pub use in_memory::InMemorySampleStore;
pub use postgres::PostgresSampleStore;

use crate::application::ports::{SharedSampleStore, StoreError};
use crate::{StoreBackend, StoreSettings};

/// The store selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredStore {
    /// Database-backed store.
    Postgres(Arc<PostgresSampleStore>),
    /// In-process store.
    Memory(Arc<InMemorySampleStore>),
}

impl ConfiguredStore {
    /// Build the adapter named by `settings.backend`.
    ///
    /// The Postgres pool connects lazily; reachability is established by the
    /// readiness probe, not here.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the connection string is malformed.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, StoreError> {
        match settings.backend {
            StoreBackend::Postgres => Ok(Self::Postgres(Arc::new(PostgresSampleStore::connect_lazy(
                &settings.database_url,
                settings.max_connections,
            )?))),
            StoreBackend::Memory => Ok(Self::Memory(Arc::new(InMemorySampleStore::new()))),
        }
    }

    /// The adapter as a port.
    #[must_use]
    pub fn shared(&self) -> SharedSampleStore {
        match self {
            Self::Postgres(store) => Arc::clone(store) as SharedSampleStore,
            Self::Memory(store) => Arc::clone(store) as SharedSampleStore,
        }
    }

    /// Create the time-series table if the adapter needs one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Schema` if table or hypertable creation fails.
    pub async fn ensure_schema(&self, create_hypertable: bool) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.ensure_schema(create_hypertable).await,
            Self::Memory(_) => Ok(()),
        }
    }
}
