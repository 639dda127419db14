//! Control and Streaming HTTP Server
//!
//! # Endpoints
//!
//! | Path | Methods | Description |
//! |------|---------|-------------|
//! | `/start` | GET, POST | Start data generation |
//! | `/stop` | GET, POST | Stop data generation |
//! | `/status` | GET | Generation state and subscriber count |
//! | `/ws/timeseries` | GET (upgrade) | Live sample stream |
//!
//! Control endpoints always answer 200 with a status line; a repeated start
//! or stop is not an error.

mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub use websocket::WebSocketSubscriber;

use crate::application::services::{
    GenerationController, GenerationState, GenerationStatsSnapshot, StartOutcome, StopOutcome,
};
use crate::infrastructure::broadcast::SharedRegistry;

// =============================================================================
// Response Types
// =============================================================================

/// Body of `/start` and `/stop`.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse<O> {
    /// Human-readable status line.
    pub status: &'static str,
    /// Machine-readable outcome.
    pub outcome: O,
}

impl From<StartOutcome> for ControlResponse<StartOutcome> {
    fn from(outcome: StartOutcome) -> Self {
        Self {
            status: outcome.message(),
            outcome,
        }
    }
}

impl From<StopOutcome> for ControlResponse<StopOutcome> {
    fn from(outcome: StopOutcome) -> Self {
        Self {
            status: outcome.message(),
            outcome,
        }
    }
}

/// Body of `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Generation task state.
    pub state: GenerationState,
    /// Attached live-stream subscribers.
    pub subscribers: usize,
    /// Loop counters.
    pub stats: GenerationStatsSnapshot,
}

// =============================================================================
// Server
// =============================================================================

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    controller: Arc<GenerationController>,
    registry: SharedRegistry,
    shutdown: CancellationToken,
}

impl ApiState {
    /// Create handler state. `shutdown` also closes open streams.
    #[must_use]
    pub const fn new(
        controller: Arc<GenerationController>,
        registry: SharedRegistry,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            registry,
            shutdown,
        }
    }
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/start", get(start_handler).post(start_handler))
        .route("/stop", get(stop_handler).post(stop_handler))
        .route("/status", get(status_handler))
        .route("/ws/timeseries", get(stream_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Control and streaming HTTP server.
pub struct ApiServer {
    port: u16,
    state: ApiState,
}

impl ApiServer {
    /// Create a server for `port`.
    #[must_use]
    pub const fn new(port: u16, state: ApiState) -> Self {
        Self { port, state }
    }

    /// Bind and serve until the state's shutdown token fires.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the server fails while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        self.run_on(listener).await
    }

    /// Serve on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError::ServerFailed` if the server fails while running.
    pub async fn run_on(self, listener: TcpListener) -> Result<(), ApiServerError> {
        let shutdown = self.state.shutdown.clone();
        let local = listener.local_addr().ok();
        tracing::info!(addr = ?local, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn start_handler(State(state): State<ApiState>) -> Json<ControlResponse<StartOutcome>> {
    Json(state.controller.start().into())
}

async fn stop_handler(State(state): State<ApiState>) -> Json<ControlResponse<StopOutcome>> {
    Json(state.controller.stop().into())
}

async fn status_handler(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.controller.state(),
        subscribers: state.registry.len(),
        stats: state.controller.stats().snapshot(),
    })
}

async fn stream_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| {
        websocket::serve_subscriber(socket, state.registry, state.shutdown)
    })
}

// =============================================================================
// Errors
// =============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
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
