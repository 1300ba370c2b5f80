//! Consumer side of the telemetry stream.
//!
//! [`ReconnectingClient`] keeps one logical session alive across many
//! physical connections. When a connection drops it waits a fixed delay and
//! dials again, up to a hard cap on consecutive failures. The cap is only
//! reset by a successful connect or an explicit [`ReconnectingClient::connect`].

mod error;
mod transport;

pub use error::ClientError;
pub use transport::{Connector, TextSink, TextStream, Transport, WsConnector};

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::protocol::{ClientMessage, Envelope};

/// Lifecycle of the logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Last attempt or live transport failed; a close follows
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// An inbound frame: parsed JSON, or the raw text when it is not JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Json(Value),
    Raw(String),
}

impl IncomingMessage {
    pub fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => IncomingMessage::Json(value),
            Err(_) => IncomingMessage::Raw(text),
        }
    }

    /// Interpret the frame as a hub envelope.
    pub fn envelope(&self) -> Option<Envelope> {
        match self {
            IncomingMessage::Json(value) => serde_json::from_value(value.clone()).ok(),
            IncomingMessage::Raw(_) => None,
        }
    }
}

/// Callbacks invoked by the client. They run on the client's tasks and
/// should not block.
pub trait ClientHandler: Send + Sync {
    fn on_open(&self) {}

    fn on_message(&self, message: IncomingMessage);

    fn on_close(&self) {}

    fn on_error(&self, _error: &ClientError) {}
}

/// Reconnect timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Fixed wait before each reconnect
    pub delay: Duration,
    /// Consecutive reconnects before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(3000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.reconnect_delay_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

struct Link {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

struct Session {
    state: ConnectionState,
    /// Bumped for every attempt and every disconnect; tasks holding an
    /// older value must not touch the session.
    generation: u64,
    attempts: u32,
    link: Option<Link>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    handler: Arc<dyn ClientHandler>,
    policy: ReconnectPolicy,
    session: Mutex<Session>,
    subscriptions: Mutex<BTreeSet<String>>,
}

/// Maintains a single logical connection to the hub.
#[derive(Clone)]
pub struct ReconnectingClient {
    inner: Arc<Inner>,
}

impl ReconnectingClient {
    pub fn new(
        connector: Arc<dyn Connector>,
        handler: Arc<dyn ClientHandler>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                handler,
                policy,
                session: Mutex::new(Session {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    attempts: 0,
                    link: None,
                    reconnect_timer: None,
                }),
                subscriptions: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    /// Client dialing `url` over WebSocket.
    pub fn websocket(
        url: impl Into<String>,
        handler: Arc<dyn ClientHandler>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self::new(Arc::new(WsConnector::new(url)), handler, policy)
    }

    /// Open a connection. No-op when already connected or connecting.
    ///
    /// Cancels any pending reconnect and restores the full retry budget.
    pub async fn connect(&self) {
        {
            let mut session = self.inner.session.lock();
            if let Some(timer) = session.reconnect_timer.take() {
                timer.abort();
            }
            session.attempts = 0;
        }
        Arc::clone(&self.inner).attempt().await;
    }

    /// Close the connection without reconnecting. Idempotent.
    pub fn disconnect(&self) {
        let (link, was_connected) = {
            let mut session = self.inner.session.lock();
            if let Some(timer) = session.reconnect_timer.take() {
                timer.abort();
            }
            session.generation += 1;
            let was_connected = session.state == ConnectionState::Connected;
            session.state = ConnectionState::Disconnected;
            (session.link.take(), was_connected)
        };

        if let Some(link) = link {
            link.cancel.cancel();
        }
        if was_connected {
            tracing::info!(url = %self.inner.connector.url(), "Disconnected");
            self.inner.handler.on_close();
        }
    }

    /// Serialize and send a message. Dropped silently unless connected.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize outgoing message");
                return false;
            }
        };
        self.inner.send_text(text)
    }

    /// Subscribe to a channel now, and again after every reconnect.
    pub fn subscribe(&self, channel: &str) -> bool {
        self.inner.subscriptions.lock().insert(channel.to_string());
        self.send(&subscribe_message(channel))
    }

    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.inner.subscriptions.lock().remove(channel);
        self.send(
            &ClientMessage::Unsubscribe {
                channel: channel.to_string(),
            }
            .to_value(None),
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.session.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnects used since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.session.lock().attempts
    }

    /// Whether a reconnect is scheduled.
    pub fn reconnect_pending(&self) -> bool {
        self.inner.session.lock().reconnect_timer.is_some()
    }
}

fn subscribe_message(channel: &str) -> Value {
    ClientMessage::Subscribe {
        channel: channel.to_string(),
    }
    .to_value(None)
}

impl Inner {
    fn send_text(&self, text: String) -> bool {
        let session = self.session.lock();
        match (&session.state, &session.link) {
            (ConnectionState::Connected, Some(link)) => link.outbound.send(text).is_ok(),
            _ => {
                tracing::trace!(state = %session.state, "Dropping outgoing message while not connected");
                false
            }
        }
    }

    fn attempt(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let generation = {
                let mut session = self.session.lock();
                if matches!(
                    session.state,
                    ConnectionState::Connected | ConnectionState::Connecting
                ) {
                    return;
                }
                session.state = ConnectionState::Connecting;
                session.generation += 1;
                session.generation
            };

            tracing::debug!(url = %self.connector.url(), "Connecting");
            let result = self.connector.connect().await;

            match result {
                Ok(transport) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let cancel = CancellationToken::new();
                    {
                        let mut session = self.session.lock();
                        if session.generation != generation {
                            return;
                        }
                        session.state = ConnectionState::Connected;
                        session.attempts = 0;
                        session.link = Some(Link {
                            outbound: tx.clone(),
                            cancel: cancel.clone(),
                        });
                    }

                    tracing::info!(url = %self.connector.url(), "Connected");
                    for channel in self.subscriptions.lock().iter() {
                        if let Ok(text) = serde_json::to_string(&subscribe_message(channel)) {
                            let _ = tx.send(text);
                        }
                    }
                    self.handler.on_open();

                    tokio::spawn(Arc::clone(&self).pump(transport, rx, cancel, generation));
                }
                Err(error) => {
                    if !self.mark_error(generation) {
                        return;
                    }
                    tracing::warn!(url = %self.connector.url(), error = %error, "Connection attempt failed");
                    self.handler.on_error(&error);
                    self.handle_close(generation);
                }
            }
        }
        .boxed()
    }

    async fn pump(
        self: Arc<Self>,
        transport: Transport,
        mut outbound: mpsc::UnboundedReceiver<String>,
        cancel: CancellationToken,
        generation: u64,
    ) {
        let Transport {
            mut sink,
            mut stream,
        } = transport;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    let _ = sink.close().await;
                    return;
                }
                Some(text) = outbound.recv() => {
                    if let Err(error) = sink.send(text).await {
                        self.transport_error(generation, error);
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handler.on_message(IncomingMessage::parse(text)),
                    Some(Err(error)) => {
                        self.transport_error(generation, error);
                        break;
                    }
                    None => break,
                },
            }
        }

        self.handle_close(generation);
    }

    /// Returns `false` when `generation` is stale.
    fn mark_error(&self, generation: u64) -> bool {
        let mut session = self.session.lock();
        if session.generation != generation {
            return false;
        }
        session.state = ConnectionState::Error;
        true
    }

    fn transport_error(&self, generation: u64, error: ClientError) {
        if self.mark_error(generation) {
            tracing::warn!(url = %self.connector.url(), error = %error, "Transport error");
            self.handler.on_error(&error);
        }
    }

    /// Close handling shared by dropped connections and failed attempts.
    fn handle_close(self: &Arc<Self>, generation: u64) {
        {
            let mut session = self.session.lock();
            if session.generation != generation {
                return;
            }
            session.link = None;
            session.state = ConnectionState::Disconnected;
        }
        self.handler.on_close();

        let mut session = self.session.lock();
        if session.generation != generation || session.state != ConnectionState::Disconnected {
            return;
        }

        if session.attempts >= self.policy.max_attempts {
            drop(session);
            let error = ClientError::RetriesExhausted {
                attempts: self.policy.max_attempts,
            };
            tracing::error!(url = %self.connector.url(), error = %error, "Giving up on reconnecting");
            self.handler.on_error(&error);
            return;
        }

        session.attempts += 1;
        tracing::info!(
            url = %self.connector.url(),
            attempt = session.attempts,
            max_attempts = self.policy.max_attempts,
            delay_ms = self.policy.delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let inner = Arc::clone(self);
        let delay = self.policy.delay;
        session.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.session.lock().reconnect_timer.take();
            inner.attempt().await;
        }));
    }
}
