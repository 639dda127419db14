//! Sample Generation
//!
//! `GenerationLoop` is the task body: produce a sample, persist it,
//! broadcast it, wait, repeat. `GenerationController` owns the single task
//! running that body and exposes idempotent start/stop.
//!
//! # Task Lifecycle
//!
//! ```text
//! Absent ──start()──► Running ──stop()──► Cancelling ──(loop exits)──► Absent
//!                        │
//!                        └──(loop exits on its own)──────────────────► Absent
//! ```
//!
//! The task slot is checked and replaced under a single lock, so concurrent
//! `start()` calls can never both observe `Started`. A task whose join handle
//! reports finished is treated as absent even though its slot is still
//! occupied.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SharedSampleStore, StoreError};
use crate::domain::sample::{SampleError, SampleGenerator};
use crate::infrastructure::broadcast::{BroadcastReport, Broadcaster};
use crate::infrastructure::metrics;
use crate::GenerationSettings;

// =============================================================================
// Configuration
// =============================================================================

/// What the loop does when the store rejects a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceFailurePolicy {
    /// Log and keep going; the live stream stays up while storage is degraded.
    #[default]
    Continue,
    /// Terminate the loop after this many consecutive failures.
    HaltAfter(u32),
}

impl PersistenceFailurePolicy {
    /// Build a policy from a failure threshold (0 = never halt).
    #[must_use]
    pub const fn from_threshold(threshold: u32) -> Self {
        if threshold == 0 {
            Self::Continue
        } else {
            Self::HaltAfter(threshold)
        }
    }

    const fn should_halt(self, consecutive_failures: u32) -> bool {
        match self {
            Self::Continue => false,
            Self::HaltAfter(limit) => consecutive_failures >= limit,
        }
    }
}

/// Generation loop configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Pause between iterations.
    pub interval: Duration,
    /// Value source.
    pub generator: SampleGenerator,
    /// Persistence failure handling.
    pub failure_policy: PersistenceFailurePolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            generator: SampleGenerator::default(),
            failure_policy: PersistenceFailurePolicy::Continue,
        }
    }
}

impl TryFrom<GenerationSettings> for GenerationConfig {
    type Error = SampleError;

    fn try_from(settings: GenerationSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            interval: settings.interval,
            generator: SampleGenerator::new(settings.value_min, settings.value_max)?,
            failure_policy: PersistenceFailurePolicy::from_threshold(
                settings.halt_after_failures,
            ),
        })
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters shared between the loop and the health endpoint.
#[derive(Debug, Default)]
pub struct GenerationStats {
    samples_generated: AtomicU64,
    samples_persisted: AtomicU64,
    persist_failures: AtomicU64,
    consecutive_failures: AtomicU32,
    messages_delivered: AtomicU64,
    subscribers_evicted: AtomicU64,
    last_sample_at: RwLock<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of `GenerationStats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStatsSnapshot {
    /// Samples produced since process start.
    pub samples_generated: u64,
    /// Samples the store accepted.
    pub samples_persisted: u64,
    /// Samples the store rejected.
    pub persist_failures: u64,
    /// Current run of back-to-back persistence failures.
    pub consecutive_failures: u32,
    /// Messages delivered across all subscribers.
    pub messages_delivered: u64,
    /// Subscribers evicted after failed sends.
    pub subscribers_evicted: u64,
    /// Timestamp of the most recent sample.
    pub last_sample_at: Option<DateTime<Utc>>,
}

impl GenerationStats {
    /// Create zeroed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn begin_run(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_generated(&self, at: DateTime<Utc>) {
        self.samples_generated.fetch_add(1, Ordering::Relaxed);
        *self.last_sample_at.write() = Some(at);
    }

    fn record_persisted(&self) {
        self.samples_persisted.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_persist_failure(&self) -> u32 {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_broadcast(&self, report: BroadcastReport) {
        self.messages_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.subscribers_evicted
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
    }

    /// Current run of back-to-back persistence failures.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Copy all counters.
    #[must_use]
    pub fn snapshot(&self) -> GenerationStatsSnapshot {
        GenerationStatsSnapshot {
            samples_generated: self.samples_generated.load(Ordering::Relaxed),
            samples_persisted: self.samples_persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            subscribers_evicted: self.subscribers_evicted.load(Ordering::Relaxed),
            last_sample_at: *self.last_sample_at.read(),
        }
    }
}

// =============================================================================
// Generation Loop
// =============================================================================

/// Errors that terminate the generation loop.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The failure policy gave up on the store.
    #[error("halted after {failures} consecutive persistence failures: {last_error}")]
    PersistenceHalted {
        /// Consecutive failures observed.
        failures: u32,
        /// The failure that tripped the policy.
        last_error: StoreError,
    },
}

/// Produce, persist, broadcast, wait, repeat.
pub struct GenerationLoop {
    store: SharedSampleStore,
    broadcaster: Arc<Broadcaster>,
    config: GenerationConfig,
    stats: Arc<GenerationStats>,
}

impl GenerationLoop {
    /// Create a loop body.
    #[must_use]
    pub fn new(
        store: SharedSampleStore,
        broadcaster: Arc<Broadcaster>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            config,
            stats: Arc::new(GenerationStats::new()),
        }
    }

    /// Shared loop statistics.
    #[must_use]
    pub fn stats(&self) -> Arc<GenerationStats> {
        Arc::clone(&self.stats)
    }

    /// Run until `cancel` fires or the failure policy halts the loop.
    ///
    /// Cancellation is observed before each iteration, during the append
    /// and during the interval wait. A sample whose append was interrupted
    /// is never broadcast. Each run starts with a fresh failure budget.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::PersistenceHalted` when the configured
    /// `PersistenceFailurePolicy` decides to stop.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), GenerationError> {
        tracing::info!(
            interval_ms = self.config.interval.as_millis(),
            policy = ?self.config.failure_policy,
            "Generation loop started"
        );
        self.stats.begin_run();

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let sample = self.config.generator.generate();
            self.stats.record_generated(sample.timestamp());
            metrics::record_sample_generated();

            let line = sample.to_wire();
            tracing::debug!(sample = %line, "Generated sample");

            let persisted = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.store.append(&sample) => result,
            };

            match persisted {
                Ok(()) => self.stats.record_persisted(),
                Err(e) => {
                    let failures = self.stats.record_persist_failure();
                    metrics::record_persist_failure();
                    tracing::error!(error = %e, consecutive_failures = failures, "Failed to persist sample");

                    if self.config.failure_policy.should_halt(failures) {
                        return Err(GenerationError::PersistenceHalted {
                            failures,
                            last_error: e,
                        });
                    }
                }
            }

            let report = self.broadcaster.publish(&line).await;
            self.stats.record_broadcast(report);
            metrics::record_iteration_duration(started.elapsed());

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!("Generation loop cancelled");
        Ok(())
    }
}

// =============================================================================
// Generation Controller
// =============================================================================

/// Result of `GenerationController::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new loop was spawned.
    Started,
    /// A loop is already running or still cancelling.
    AlreadyRunning,
}

impl StartOutcome {
    /// Human-readable status line.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Started => "Data generation started.",
            Self::AlreadyRunning => "Data generation already running.",
        }
    }
}

/// Result of `GenerationController::stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Cancellation was signalled.
    Stopped,
    /// Nothing was running.
    NotRunning,
}

impl StopOutcome {
    /// Human-readable status line.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Stopped => "Data generation stopped.",
            Self::NotRunning => "No data generation running.",
        }
    }
}

/// Observable state of the generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    /// No task, or the last task has exited.
    Absent,
    /// Task running.
    Running,
    /// Stop requested, task not yet exited.
    Cancelling,
}

/// Holds the running gauge at 1 until dropped, unwinding included.
struct RunningGauge;

impl RunningGauge {
    fn raise() -> Self {
        metrics::set_generation_running(true);
        Self
    }
}

impl Drop for RunningGauge {
    fn drop(&mut self) {
        metrics::set_generation_running(false);
    }
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningTask {
    fn state(&self) -> GenerationState {
        if self.handle.is_finished() {
            GenerationState::Absent
        } else if self.cancel.is_cancelled() {
            GenerationState::Cancelling
        } else {
            GenerationState::Running
        }
    }
}

/// Owns the single generation task.
pub struct GenerationController {
    generation: Arc<GenerationLoop>,
    root: CancellationToken,
    slot: Mutex<Option<RunningTask>>,
}

impl GenerationController {
    /// Create a controller for `generation`.
    #[must_use]
    pub fn new(generation: Arc<GenerationLoop>) -> Self {
        Self {
            generation,
            root: CancellationToken::new(),
            slot: Mutex::new(None),
        }
    }

    /// Statistics of the controlled loop.
    #[must_use]
    pub fn stats(&self) -> Arc<GenerationStats> {
        self.generation.stats()
    }

    /// Spawn the loop unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> StartOutcome {
        let mut slot = self.slot.lock();

        if slot
            .as_ref()
            .is_some_and(|task| task.state() != GenerationState::Absent)
        {
            return StartOutcome::AlreadyRunning;
        }

        let cancel = self.root.child_token();
        let generation = Arc::clone(&self.generation);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let _gauge = RunningGauge::raise();
            match generation.run(token).await {
                Ok(()) => tracing::info!("Data generation stopped"),
                Err(e) => tracing::error!(error = %e, "Data generation terminated"),
            }
        });

        *slot = Some(RunningTask { cancel, handle });
        tracing::info!("Started data generation");
        StartOutcome::Started
    }

    /// Signal the running loop to stop. Does not wait for it to exit.
    pub fn stop(&self) -> StopOutcome {
        let slot = self.slot.lock();

        match slot.as_ref() {
            Some(task) if task.state() == GenerationState::Running => {
                task.cancel.cancel();
                tracing::info!("Stopped data generation");
                StopOutcome::Stopped
            }
            _ => StopOutcome::NotRunning,
        }
    }

    /// Current task state.
    #[must_use]
    pub fn state(&self) -> GenerationState {
        self.slot
            .lock()
            .as_ref()
            .map_or(GenerationState::Absent, RunningTask::state)
    }

    /// Whether a loop is running (not cancelling, not exited).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == GenerationState::Running
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// After shutdown, later `start()` calls spawn loops that exit at once.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let task = self.slot.lock().take();

        if let Some(task) = task
            && let Err(e) = task.handle.await
        {
            tracing::error!(error = %e, "Generation task panicked");
        }
    }
}

impl std::fmt::Debug for GenerationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationController")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
