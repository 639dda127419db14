//! Application Services
//!
//! - `GenerationController`: single-task start/stop control
//! - `GenerationLoop`: produce, persist, broadcast, wait
//! - `wait_until_ready`: bounded store readiness probe

/// Generation loop, controller and statistics.
pub mod generation;

/// Store readiness probe.
pub mod readiness;

pub use generation::{
    GenerationConfig, GenerationController, GenerationError, GenerationLoop, GenerationState,
    GenerationStats, GenerationStatsSnapshot, PersistenceFailurePolicy, StartOutcome, StopOutcome,
};
pub use readiness::{ReadinessPolicy, wait_until_ready};
