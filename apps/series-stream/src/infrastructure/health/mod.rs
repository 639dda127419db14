//! Health Check and Metrics Endpoint
//!
//! Served on its own port so orchestrators can probe the process before the
//! store is ready and the control API is up.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe (store passed the readiness probe)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{GenerationController, GenerationState, GenerationStatsSnapshot};
use crate::infrastructure::broadcast::SharedRegistry;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Sample store status.
    pub store: StoreStatus,
    /// Generation loop status.
    pub generation: GenerationStatus,
    /// Attached live-stream subscribers.
    pub subscribers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store ready, last append succeeded.
    Healthy,
    /// Store ready but appends are currently failing.
    Degraded,
    /// Store has not passed the readiness probe.
    Unhealthy,
}

/// Sample store status.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    /// Configured backend.
    pub backend: &'static str,
    /// Whether the readiness probe succeeded.
    pub ready: bool,
}

/// Generation loop status.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationStatus {
    /// Task state.
    pub state: GenerationState,
    /// Loop counters.
    #[serde(flatten)]
    pub stats: GenerationStatsSnapshot,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    store_backend: &'static str,
    store_ready: AtomicBool,
    controller: Arc<GenerationController>,
    registry: SharedRegistry,
}

impl HealthServerState {
    /// Create new health server state. The store starts out not ready.
    #[must_use]
    pub fn new(
        version: String,
        store_backend: &'static str,
        controller: Arc<GenerationController>,
        registry: SharedRegistry,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            store_backend,
            store_ready: AtomicBool::new(false),
            controller,
            registry,
        }
    }

    /// Record the outcome of the readiness probe.
    pub fn set_store_ready(&self, ready: bool) {
        self.store_ready.store(ready, Ordering::Release);
    }

    /// Whether the store passed the readiness probe.
    #[must_use]
    pub fn is_store_ready(&self) -> bool {
        self.store_ready.load(Ordering::Acquire)
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Build the health router.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.is_store_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let ready = state.is_store_ready();
    let stats = state.controller.stats().snapshot();

    HealthResponse {
        status: determine_health_status(ready, stats.consecutive_failures),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        store: StoreStatus {
            backend: state.store_backend,
            ready,
        },
        generation: GenerationStatus {
            state: state.controller.state(),
            stats,
        },
        subscribers: state.registry.len(),
    }
}

const fn determine_health_status(store_ready: bool, consecutive_failures: u32) -> HealthStatus {
    match (store_ready, consecutive_failures) {
        (false, _) => HealthStatus::Unhealthy,
        (true, 0) => HealthStatus::Healthy,
        (true, _) => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use test_case::test_case;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::MockStore;
    use crate::application::services::{GenerationConfig, GenerationLoop};
    use crate::infrastructure::broadcast::{BroadcastConfig, Broadcaster, LiveRegistry};

    fn state() -> Arc<HealthServerState> {
        let registry = Arc::new(LiveRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            BroadcastConfig::default(),
        ));
        let generation = Arc::new(GenerationLoop::new(
            Arc::new(MockStore::new()),
            broadcaster,
            GenerationConfig::default(),
        ));
        Arc::new(HealthServerState::new(
            "0.1.0".to_string(),
            "memory",
            Arc::new(GenerationController::new(generation)),
            registry,
        ))
    }

    async fn get_status(state: &Arc<HealthServerState>, uri: &str) -> StatusCode {
        router(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test_case(false, 0, HealthStatus::Unhealthy ; "store not ready")]
    #[test_case(false, 3, HealthStatus::Unhealthy ; "not ready and failing")]
    #[test_case(true, 0, HealthStatus::Healthy ; "ready")]
    #[test_case(true, 2, HealthStatus::Degraded ; "ready but appends failing")]
    fn determine_status(ready: bool, failures: u32, expected: HealthStatus) {
        assert_eq!(determine_health_status(ready, failures), expected);
    }

    #[tokio::test]
    async fn readiness_follows_store_probe() {
        let state = state();

        assert_eq!(get_status(&state, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(get_status(&state, "/health").await, StatusCode::SERVICE_UNAVAILABLE);

        state.set_store_ready(true);

        assert_eq!(get_status(&state, "/readyz").await, StatusCode::OK);
        assert_eq!(get_status(&state, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn liveness_is_unconditional() {
        assert_eq!(get_status(&state(), "/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_body_reports_generation_state() {
        let state = state();
        state.set_store_ready(true);

        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"]["backend"], "memory");
        assert_eq!(body["generation"]["state"], "absent");
        assert_eq!(body["generation"]["samples_generated"], 0);
        assert_eq!(body["subscribers"], 0);
    }
}
