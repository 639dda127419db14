//! Shared harness: a full API server on an ephemeral port.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use series_stream::{
    ApiServer, ApiState, BroadcastConfig, Broadcaster, GenerationConfig, GenerationController,
    GenerationLoop, LiveRegistry, SharedSampleStore,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TestService {
    pub addr: SocketAddr,
    pub controller: Arc<GenerationController>,
    pub registry: Arc<LiveRegistry>,
    pub shutdown: CancellationToken,
    pub server: JoinHandle<()>,
    http: reqwest::Client,
}

impl TestService {
    pub async fn start(store: SharedSampleStore, config: GenerationConfig) -> Self {
        let registry = Arc::new(LiveRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            BroadcastConfig {
                send_timeout: Duration::from_millis(500),
            },
        ));
        let controller = Arc::new(GenerationController::new(Arc::new(GenerationLoop::new(
            store,
            broadcaster,
            config,
        ))));
        let shutdown = CancellationToken::new();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ApiState::new(
            Arc::clone(&controller),
            Arc::clone(&registry),
            shutdown.clone(),
        );
        let server = tokio::spawn(async move {
            ApiServer::new(0, state).run_on(listener).await.unwrap();
        });

        Self {
            addr,
            controller,
            registry,
            shutdown,
            server,
            http: reqwest::Client::new(),
        }
    }

    pub fn stream_url(&self) -> String {
        format!("ws://{}/ws/timeseries", self.addr)
    }

    /// Send a bodyless request and return the status code and JSON body.
    pub async fn request(&self, method: &str, path: &str) -> (u16, serde_json::Value) {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap();
        let response = self
            .http
            .request(method, format!("http://{}{path}", self.addr))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();

        (status, response.json().await.expect("body is not JSON"))
    }

    pub async fn wait_for_subscribers(&self, expected: usize) {
        wait_until(|| self.registry.len() == expected).await;
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.controller.shutdown().await;
        tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

pub fn fast_config() -> GenerationConfig {
    GenerationConfig {
        interval: Duration::from_millis(20),
        ..GenerationConfig::default()
    }
}
