//! Domain Layer - Samples and subscriber membership.
//!
//! Pure types with no transport or storage dependencies.

/// Sample values, wire format and generator.
pub mod sample;

/// Subscriber registry.
pub mod subscription;
