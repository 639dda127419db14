#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Series Stream - Time-Series Generator and Live Broadcaster
//!
//! Produces one random sample per interval, appends it to a time-series
//! store and pushes it to every connected WebSocket subscriber. Generation
//! is started and stopped over HTTP.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `sample`: `Sample`, wire format, `SampleGenerator`
//!   - `subscription`: `SubscriberRegistry`
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `SampleStore`, `SubscriberSink`
//!   - `services`: generation control, store readiness
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: fan-out with per-subscriber failure isolation
//!   - `store`: Postgres / `TimescaleDB` and in-memory stores
//!   - `http`: control API and `/ws/timeseries`
//!   - `config`, `health`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────┐
//!  POST /start ────► │  Generation  │── append ──► timeseries table
//!  POST /stop  ────► │     Loop     │
//!                    └──────┬───────┘
//!                           │ publish
//!                    ┌──────▼───────┐
//!                    │  Broadcaster │──► WebSocket 1
//!                    │              │──► WebSocket 2
//!                    └──────────────┘──► WebSocket N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Samples and subscriber bookkeeping, no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::sample::{Sample, SampleError, SampleGenerator};
pub use domain::subscription::{SubscriberId, SubscriberRegistry};

// Ports
pub use application::ports::{
    ChannelError, SampleStore, SharedSampleStore, SharedSubscriber, StoreError, SubscriberSink,
};

// Services
pub use application::services::{
    GenerationConfig, GenerationController, GenerationError, GenerationLoop, GenerationState,
    PersistenceFailurePolicy, ReadinessPolicy, StartOutcome, StopOutcome, wait_until_ready,
};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, GenerationSettings, ServerSettings, ServiceConfig,
    StoreBackend, StoreSettings,
};

// Broadcast
pub use infrastructure::broadcast::{BroadcastConfig, BroadcastReport, Broadcaster, LiveRegistry};

// Servers
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};
pub use infrastructure::http::{ApiServer, ApiServerError, ApiState};

// Stores
pub use infrastructure::store::{ConfiguredStore, InMemorySampleStore, PostgresSampleStore};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
