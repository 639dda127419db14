//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the process
//! plumbing around them.

/// Subscriber fan-out.
pub mod broadcast;

/// Environment-driven configuration.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Control API and WebSocket stream.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Sample store adapters.
pub mod store;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
