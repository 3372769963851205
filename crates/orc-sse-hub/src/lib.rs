//! Per-task pub/sub of progress events over Server-Sent Events.
//!
//! Grounded in `examples/original_source/app/sse.py`'s `StreamHub`
//! (publish/close/heartbeat semantics) and implemented the way the
//! teacher shapes shared in-memory registries — an
//! `Arc<Mutex<HashMap<...>>>` rather than a `dashmap` dependency the
//! teacher never pulls in (see `entity_gateway::index::IndexRegistry`).
//! The broadcast channel itself, and the
//! `Sse<impl Stream<Item = Result<Event, Infallible>>>` adaptation this
//! crate's `stream()` is meant to feed, follow
//! `ob-poc-web/src/routes/chat.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// One frame of the hub's output: either a data frame carrying a JSON
/// payload, or a heartbeat keep-alive. `orc-server` maps this onto
/// `axum::response::sse::Event`.
#[derive(Debug, Clone)]
pub enum Frame {
    Data(String),
    Heartbeat,
}

const CHANNEL_CAPACITY: usize = 256;

struct Entry {
    sender: broadcast::Sender<String>,
}

/// Per-task pub/sub hub. Cloning is cheap — it's an `Arc` handle
/// shared between the worker (publisher) and every HTTP handler
/// (subscriber).
#[derive(Clone)]
pub struct SseHub {
    entries: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl Default for SseHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SseHub {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn entry_sender(&self, task_id: Uuid) -> broadcast::Sender<String> {
        let mut guard = self.entries.lock().await;
        guard
            .entry(task_id)
            .or_insert_with(|| Entry {
                sender: broadcast::channel(CHANNEL_CAPACITY).0,
            })
            .sender
            .clone()
    }

    /// Publish a JSON payload to every subscriber currently attached to
    /// `task_id`. A publish with no subscribers is not an error — it's
    /// simply dropped, matching `tokio::sync::broadcast`'s semantics.
    pub async fn publish(&self, task_id: Uuid, payload: &Value) {
        let sender = self.entry_sender(task_id).await;
        let body = payload.to_string();
        // A send error here only means zero active receivers, which is
        // expected and not worth logging at warn level.
        let _ = sender.send(body);
    }

    /// Subscribe to `task_id`. A late subscriber only sees messages
    /// published after this call — recovery of missed terminal state
    /// is `orc-final-assembler`'s job, per spec.
    pub async fn subscribe(&self, task_id: Uuid) -> broadcast::Receiver<String> {
        self.entry_sender(task_id).await.subscribe()
    }

    /// Discard all per-task state. Existing subscribers' streams end
    /// the next time they'd otherwise wait, since the sender is
    /// dropped.
    pub async fn close(&self, task_id: Uuid) {
        self.entries.lock().await.remove(&task_id);
    }

    /// Build a frame stream for `task_id`: forwards every published
    /// payload as [`Frame::Data`], and emits [`Frame::Heartbeat`] after
    /// `heartbeat` of silence. Runs until the hub entry is closed.
    pub async fn stream(
        &self,
        task_id: Uuid,
        heartbeat: Duration,
    ) -> impl futures::Stream<Item = Frame> {
        let receiver = self.subscribe(task_id).await;
        let mut inner = BroadcastStream::new(receiver);

        futures::stream::unfold((), move |()| {
            let fut = async {
                use futures::StreamExt;
                loop {
                    match tokio::time::timeout(heartbeat, inner.next()).await {
                        Ok(Some(Ok(payload))) => return Some((Frame::Data(payload), ())),
                        Ok(Some(Err(_lagged))) => continue,
                        Ok(None) => return None,
                        Err(_elapsed) => return Some((Frame::Heartbeat, ())),
                    }
                }
            };
            fut
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn publish_then_subscribe_sees_only_future_messages() {
        let hub = SseHub::new();
        let task_id = Uuid::new_v4();

        hub.publish(task_id, &serde_json::json!({"status": "queued"}))
            .await;

        let mut receiver = hub.subscribe(task_id).await;
        hub.publish(task_id, &serde_json::json!({"status": "running"}))
            .await;

        let msg = receiver.recv().await.unwrap();
        assert!(msg.contains("running"));
    }

    #[tokio::test]
    async fn close_drops_future_publishes() {
        let hub = SseHub::new();
        let task_id = Uuid::new_v4();
        let mut receiver = hub.subscribe(task_id).await;
        hub.close(task_id).await;
        hub.publish(task_id, &serde_json::json!({"status": "done"}))
            .await;
        // a fresh entry was created by publish() after close, so this
        // receiver (from the old, now-discarded entry) never gets it.
        let res = tokio::time::timeout(Duration::from_millis(50), receiver.recv()).await;
        assert!(res.is_err() || res.unwrap().is_err());
    }

    #[tokio::test]
    async fn heartbeat_emitted_on_silence() {
        let hub = SseHub::new();
        let task_id = Uuid::new_v4();
        let mut stream = Box::pin(hub.stream(task_id, Duration::from_millis(20)).await);
        let frame = stream.next().await.unwrap();
        assert!(matches!(frame, Frame::Heartbeat));
    }

    #[tokio::test]
    async fn data_frame_delivered_before_heartbeat() {
        let hub = SseHub::new();
        let task_id = Uuid::new_v4();
        let mut stream = Box::pin(hub.stream(task_id, Duration::from_secs(5)).await);
        hub.publish(task_id, &serde_json::json!({"status": "running"}))
            .await;
        let frame = stream.next().await.unwrap();
        match frame {
            Frame::Data(payload) => assert!(payload.contains("running")),
            Frame::Heartbeat => panic!("expected data frame"),
        }
    }
}
