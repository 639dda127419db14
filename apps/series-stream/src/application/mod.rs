//! Application Layer - Use cases and port definitions.
//!
//! Ports describe what the generation loop needs from storage and from
//! subscribers; services drive the loop and the startup readiness probe.

/// Port interfaces for the sample store and subscriber channels.
pub mod ports;

/// Generation control and store readiness.
pub mod services;
