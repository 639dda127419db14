//! Series Stream Binary
//!
//! Starts the time-series generator, its control API and live stream.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin series-stream
//! ```
//!
//! # Environment Variables
//!
//! - `SERIES_STREAM_HTTP_PORT`: control and stream port (default: 8000)
//! - `SERIES_STREAM_HEALTH_PORT`: health check HTTP port (default: 8082)
//! - `SERIES_STREAM_INTERVAL_MS`: pause between samples (default: 1000)
//! - `SERIES_STREAM_VALUE_MIN` / `SERIES_STREAM_VALUE_MAX`: value range (default: 0 / 100)
//! - `SERIES_STREAM_HALT_AFTER_FAILURES`: stop after N failed appends in a row (default: 0, never)
//! - `SERIES_STREAM_SEND_TIMEOUT_MS`: per-subscriber send timeout (default: 5000)
//! - `SERIES_STREAM_STORE`: postgres | memory (default: postgres)
//! - `DATABASE_URL`: Postgres connection string
//! - `SERIES_STREAM_DB_MAX_CONNECTIONS`: pool size (default: 5)
//! - `SERIES_STREAM_READINESS_ATTEMPTS`: store readiness attempts (default: 10)
//! - `SERIES_STREAM_READINESS_DELAY_SECS`: pause between attempts (default: 2)
//! - `SERIES_STREAM_HYPERTABLE`: create a `TimescaleDB` hypertable (default: true)
//! - `SERIES_STREAM_LOG_FORMAT`, `OTEL_*`, `RUST_LOG`: see `telemetry`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use series_stream::application::services::{
    GenerationConfig, GenerationController, GenerationLoop, ReadinessPolicy, wait_until_ready,
};
use series_stream::infrastructure::broadcast::{BroadcastConfig, Broadcaster, LiveRegistry};
use series_stream::infrastructure::health::{HealthServer, HealthServerState};
use series_stream::infrastructure::http::{ApiServer, ApiState};
use series_stream::infrastructure::store::ConfiguredStore;
use series_stream::infrastructure::telemetry;
use series_stream::{ServiceConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Upper bound on waiting for the generation loop to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting series stream");

    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let store = ConfiguredStore::from_settings(&config.store).context("failed to create store")?;

    let registry = Arc::new(LiveRegistry::new());
    let broadcaster = Arc::new(Broadcaster::new(
        Arc::clone(&registry),
        BroadcastConfig::from(config.broadcast),
    ));
    let generation_config = GenerationConfig::try_from(config.generation.clone())
        .context("invalid generation settings")?;
    let generation = Arc::new(GenerationLoop::new(
        store.shared(),
        broadcaster,
        generation_config,
    ));
    let controller = Arc::new(GenerationController::new(generation));

    // Health comes up first so orchestrators can see NOT READY during the probe.
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        config.store.backend.as_str(),
        Arc::clone(&controller),
        Arc::clone(&registry),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        Arc::clone(&health_state),
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let policy = ReadinessPolicy::from(&config.store);
    let shared_store = store.shared();
    tokio::select! {
        result = wait_until_ready(shared_store.as_ref(), policy) => {
            result.context("store did not become ready")?;
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Shutdown requested before the store became ready");
            return Ok(());
        }
    }

    store
        .ensure_schema(config.store.create_hypertable)
        .await
        .context("failed to bootstrap schema")?;
    health_state.set_store_ready(true);

    let api_state = ApiState::new(
        Arc::clone(&controller),
        Arc::clone(&registry),
        shutdown_token.clone(),
    );

    tracing::info!("Series stream ready");

    let api_result = ApiServer::new(config.server.http_port, api_state).run().await;

    // The API server also returns early on a bind failure; make sure
    // everything else stops too.
    shutdown_token.cancel();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, controller.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Generation loop did not stop in time"
        );
    }

    api_result.context("API server failed")?;
    tracing::info!("Series stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        health_port = config.server.health_port,
        interval_ms = config.generation.interval.as_millis(),
        value_min = config.generation.value_min,
        value_max = config.generation.value_max,
        store = config.store.backend.as_str(),
        "Configuration loaded"
    );
    tracing::debug!(store = ?config.store, broadcast = ?config.broadcast, "Store and broadcast settings");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT, then cancel `shutdown_token`.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
