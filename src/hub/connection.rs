//! Per-client connection state.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::error::TransportError;
use crate::protocol::Envelope;

/// Frame queued for a client's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized envelope, shared across all recipients of a broadcast
    Text(Arc<str>),
    /// Liveness ping
    Ping,
}

impl Outbound {
    pub fn into_text(self) -> Option<Arc<str>> {
        match self {
            Outbound::Text(text) => Some(text),
            Outbound::Ping => None,
        }
    }
}

/// A connected client as seen by the hub.
pub struct ClientConnection {
    /// Unique connection ID (UUID v4)
    pub id: String,
    /// When the connection was accepted
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<Outbound>,
    subscriptions: Mutex<HashSet<String>>,
    last_liveness: Mutex<Instant>,
    auth_context: Mutex<Option<Value>>,
    closed: CancellationToken,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    pub fn new(id: String, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            connected_at: Utc::now(),
            tx,
            subscriptions: Mutex::new(HashSet::new()),
            last_liveness: Mutex::new(Instant::now()),
            auth_context: Mutex::new(None),
            closed: CancellationToken::new(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Add a channel. Returns `false` if already subscribed.
    pub fn subscribe(&self, channel: &str) -> bool {
        self.subscriptions.lock().insert(channel.to_string())
    }

    /// Remove a channel. Returns `false` if not subscribed.
    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.subscriptions.lock().remove(channel)
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.lock().contains(channel)
    }

    /// Current subscriptions, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.subscriptions.lock().iter().cloned().collect();
        channels.sort();
        channels
    }

    /// Record a liveness signal.
    pub fn touch(&self) {
        *self.last_liveness.lock() = Instant::now();
    }

    pub fn last_liveness(&self) -> Instant {
        *self.last_liveness.lock()
    }

    pub fn set_auth_context(&self, identity: Value) {
        *self.auth_context.lock() = Some(identity);
    }

    pub fn auth_context(&self) -> Option<Value> {
        self.auth_context.lock().clone()
    }

    /// Whether frames can still be delivered.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled() && !self.tx.is_closed()
    }

    /// Queue a frame without waiting.
    pub fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.tx.try_send(frame).map_err(|e| {
            self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
            }
        })
    }

    pub fn send_text(&self, text: Arc<str>) -> Result<(), TransportError> {
        self.send(Outbound::Text(text))
    }

    pub fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let json = envelope.to_json()?;
        self.send_text(Arc::from(json))
    }

    /// Queue a liveness ping.
    pub fn ping(&self) -> Result<(), TransportError> {
        self.send(Outbound::Ping)
    }

    /// Ask the writer task to close the transport. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Frames that could not be queued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("subscriptions", &self.subscriptions())
            .field("open", &self.is_open())
            .finish()
    }
}
