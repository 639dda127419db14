//! WebSocket Subscribers
//!
//! Each upgraded connection is split: the outbound half becomes a
//! `SubscriberSink` in the registry, the inbound half is watched for
//! close, error or end-of-stream, any of which detaches the subscriber.
//! Closing the outbound half, as the broadcaster does on eviction, also
//! ends the read loop so the socket is released.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ChannelError, SharedSubscriber, SubscriberSink};
use crate::infrastructure::broadcast::SharedRegistry;
use crate::infrastructure::metrics;

/// Outbound half of a live-stream WebSocket.
pub struct WebSocketSubscriber {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: CancellationToken,
}

impl WebSocketSubscriber {
    /// Wrap the outbound half of a socket.
    #[must_use]
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
            closed: CancellationToken::new(),
        }
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl SubscriberSink for WebSocketSubscriber {
    async fn send(&self, message: &str) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(Message::Text(message.to_owned().into()))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn close(&self) {
        self.closed.cancel();
        let _ = self.sink.lock().await.close().await;
    }
}

/// Serve one upgraded connection until the peer leaves or the server stops.
pub(crate) async fn serve_subscriber(
    socket: WebSocket,
    registry: SharedRegistry,
    shutdown: CancellationToken,
) {
    let (sink, mut inbound) = socket.split();
    let subscriber = Arc::new(WebSocketSubscriber::new(sink));
    let id = registry.attach(Arc::clone(&subscriber) as SharedSubscriber);
    metrics::set_subscribers(registry.len());
    tracing::info!(subscriber_id = %id, subscribers = registry.len(), "Subscriber attached");

    loop {
        tokio::select! {
            () = subscriber.closed.cancelled() => break,
            () = shutdown.cancelled() => {
                subscriber.close().await;
                break;
            }
            frame = inbound.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber_id = %id, error = %e, "Subscriber read failed");
                    break;
                }
            }
        }
    }

    if registry.detach(id) {
        metrics::set_subscribers(registry.len());
        tracing::info!(subscriber_id = %id, subscribers = registry.len(), "Subscriber detached");
    }
}
