//! Generation Control Integration Tests
//!
//! Exercises `/start`, `/stop` and `/status` over real HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use series_stream::{
    GenerationConfig, GenerationState, InMemorySampleStore, PersistenceFailurePolicy, Sample,
    SampleStore, StoreError,
};

use common::{TestService, fast_config, wait_until};

/// Rejects every append.
#[derive(Default)]
struct BrokenStore {
    attempts: AtomicU32,
}

#[async_trait]
impl SampleStore for BrokenStore {
    async fn append(&self, _sample: &Sample) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let service = TestService::start(Arc::new(InMemorySampleStore::new()), fast_config()).await;

    let (status, body) = service.request("POST", "/start").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "Data generation started.");

    let (status, body) = service.request("POST", "/start").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "Data generation already running.");
    assert_eq!(body["outcome"], "already_running");

    service.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let service = TestService::start(Arc::new(InMemorySampleStore::new()), fast_config()).await;

    let (_, body) = service.request("GET", "/stop").await;
    assert_eq!(body["status"], "No data generation running.");

    service.request("GET", "/start").await;

    let (status, body) = service.request("POST", "/stop").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "Data generation stopped.");

    let (status, body) = service.request("POST", "/stop").await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "not_running");

    service.stop().await;
}

#[tokio::test]
async fn test_status_reflects_lifecycle() {
    let store = Arc::new(InMemorySampleStore::new());
    let service = TestService::start(store.clone(), fast_config()).await;

    let (_, body) = service.request("GET", "/status").await;
    assert_eq!(body["state"], "absent");

    service.request("POST", "/start").await;
    wait_until(|| store.len() >= 2).await;

    let (_, body) = service.request("GET", "/status").await;
    assert_eq!(body["state"], "running");
    assert!(body["stats"]["samples_persisted"].as_u64().unwrap() >= 2);

    service.request("POST", "/stop").await;
    wait_until(|| service.controller.state() == GenerationState::Absent).await;

    let (_, body) = service.request("GET", "/status").await;
    assert_eq!(body["state"], "absent");

    service.stop().await;
}

#[tokio::test]
async fn test_stopped_generation_persists_nothing_more() {
    let store = Arc::new(InMemorySampleStore::new());
    let service = TestService::start(store.clone(), fast_config()).await;

    service.request("POST", "/start").await;
    wait_until(|| !store.is_empty()).await;
    service.request("POST", "/stop").await;
    wait_until(|| service.controller.state() == GenerationState::Absent).await;

    let stored = store.len();
    tokio::time::sleep(fast_config().interval * 5).await;
    assert_eq!(store.len(), stored);

    service.stop().await;
}

#[tokio::test]
async fn test_restart_after_persistence_halt() {
    let store = Arc::new(BrokenStore::default());
    let config = GenerationConfig {
        failure_policy: PersistenceFailurePolicy::HaltAfter(2),
        ..fast_config()
    };
    let service = TestService::start(store.clone(), config).await;

    let (_, body) = service.request("POST", "/start").await;
    assert_eq!(body["outcome"], "started");
    wait_until(|| service.controller.state() == GenerationState::Absent).await;
    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);

    let (_, body) = service.request("POST", "/stop").await;
    assert_eq!(body["outcome"], "not_running");

    let (_, body) = service.request("POST", "/start").await;
    assert_eq!(body["outcome"], "started");

    service.stop().await;
}

#[tokio::test]
async fn test_failing_store_keeps_stream_alive_by_default() {
    let store = Arc::new(BrokenStore::default());
    let service = TestService::start(store.clone(), fast_config()).await;

    service.request("POST", "/start").await;
    wait_until(|| store.attempts.load(Ordering::SeqCst) >= 3).await;

    let (_, body) = service.request("GET", "/status").await;
    assert_eq!(body["state"], "running");
    assert!(body["stats"]["consecutive_failures"].as_u64().unwrap() >= 3);

    service.stop().await;
}

#[tokio::test]
async fn test_concurrent_start_requests_spawn_one_loop() {
    let service = Arc::new(
        TestService::start(Arc::new(InMemorySampleStore::new()), fast_config()).await,
    );

    let requests: Vec<_> = (0..16)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.request("POST", "/start").await.1 })
        })
        .collect();

    let mut started = 0;
    for request in requests {
        if request.await.unwrap()["outcome"] == "started" {
            started += 1;
        }
    }
    assert_eq!(started, 1);

    let service = Arc::into_inner(service).expect("requests still hold the service");
    service.stop().await;
}
