//! Shared test utilities for Pulse integration tests.
//!
//! Provides scripted metric sources, an in-process hub bound to an
//! ephemeral port, and a thin WebSocket test client.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use pulse::api::{create_router, AppState};
use pulse::config::PulseConfig;
use pulse::hub::BroadcastRegistry;
use pulse::telemetry::{
    Cadence, MetricKind, MetricSource, Snapshot, SnapshotStore, SourceError, TelemetryScheduler,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// How long a test waits for a frame before failing.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Metric Sources
// =============================================================================

/// Source that replays scripted payloads, repeating the last one forever.
pub struct ScriptedSource {
    kind: MetricKind,
    script: Mutex<VecDeque<Result<Value, SourceError>>>,
    last: Mutex<Option<Value>>,
    polls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(kind: MetricKind, script: Vec<Result<Value, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            polls: AtomicUsize::new(0),
        })
    }

    /// Source that always returns `payload`.
    pub fn constant(kind: MetricKind, payload: Value) -> Arc<Self> {
        Self::new(kind, vec![Ok(payload)])
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    async fn poll(&self) -> Result<Snapshot, SourceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        let payload = match next {
            Some(Ok(payload)) => {
                *self.last.lock() = Some(payload.clone());
                payload
            }
            Some(Err(e)) => return Err(e),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| SourceError::InvalidPayload("script exhausted".to_string()))?,
        };
        Ok(Snapshot::new(self.kind, payload))
    }
}

// =============================================================================
// Hub Builders
// =============================================================================

/// Build hub state whose scheduler runs the given sources every second.
pub fn make_state(config: PulseConfig, sources: Vec<Arc<ScriptedSource>>) -> Arc<AppState> {
    let config = Arc::new(config);
    let registry = Arc::new(BroadcastRegistry::new());
    let store = Arc::new(SnapshotStore::from_config(&config.telemetry));
    let scheduler = sources.into_iter().fold(
        TelemetryScheduler::new(Arc::clone(&store), Arc::clone(&registry)),
        |scheduler, source| {
            scheduler.with_source(source, Cadence::every(Duration::from_secs(1)))
        },
    );
    Arc::new(AppState::from_parts(
        config,
        registry,
        store,
        Arc::new(scheduler),
    ))
}

/// Serve `state` on an ephemeral localhost port.
pub async fn spawn_hub(state: Arc<AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}/ws", addr)
}

// =============================================================================
// WebSocket Test Client
// =============================================================================

pub struct TestClient {
    pub id: String,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect and consume the `connected` welcome.
    pub async fn connect(addr: SocketAddr) -> Self {
        let (socket, _) = tokio_tungstenite::connect_async(ws_url(addr)).await.unwrap();
        let mut client = Self {
            id: String::new(),
            socket,
        };
        let welcome = client.next_json().await;
        assert_eq!(welcome["type"], "connected");
        client.id = welcome["data"]["clientId"].as_str().unwrap().to_string();
        client
    }

    pub async fn send_json(&mut self, value: Value) {
        self.socket
            .send(Message::Text(value.to_string()))
            .await
            .unwrap();
    }

    /// Subscribe and consume the acknowledgement.
    pub async fn subscribe(&mut self, channel: &str) {
        self.send_json(serde_json::json!({ "type": "subscribe", "data": { "channel": channel } }))
            .await;
        let ack = self.next_of_type("subscribed").await;
        assert_eq!(ack["data"]["channel"], channel);
    }

    /// Next text frame parsed as JSON. Control frames are skipped.
    pub async fn next_json(&mut self) -> Value {
        tokio::time::timeout(FRAME_TIMEOUT, async {
            loop {
                match self.socket.next().await {
                    Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                    Some(Ok(_)) => continue,
                    other => panic!("socket ended: {:?}", other),
                }
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    /// Skip frames until one of `message_type` arrives.
    pub async fn next_of_type(&mut self, message_type: &str) -> Value {
        loop {
            let frame = self.next_json().await;
            if frame["type"] == message_type {
                return frame;
            }
        }
    }

    /// Assert no text frame arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        let result = tokio::time::timeout(wait, async {
            loop {
                match self.socket.next().await {
                    Some(Ok(Message::Text(text))) => return Some(text),
                    Some(Ok(_)) => continue,
                    _ => return None,
                }
            }
        })
        .await;
        if let Ok(Some(text)) = result {
            panic!("unexpected frame: {}", text);
        }
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// Poll `check` until it holds or `FRAME_TIMEOUT` passes.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(FRAME_TIMEOUT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
