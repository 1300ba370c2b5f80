//! Protocol-facing side of the hub: accepts connections, interprets control
//! messages and sweeps dead clients.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::auth::AuthVerifier;
use super::connection::{ClientConnection, Outbound};
use super::registry::{BroadcastRegistry, BroadcastReport, EvictionReason};
use crate::config::{LivenessConfig, MAX_DURATION_SECONDS};
use crate::protocol::{ClientMessage, Envelope, InboundMessage};
use crate::telemetry::{MetricKind, SnapshotStore, TelemetryScheduler};

/// Outbound queue depth used when none is configured.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Result of one liveness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Clients examined
    pub checked: usize,
    /// Clients sent a liveness ping
    pub pinged: usize,
    /// Clients removed, with the reason
    pub evicted: Vec<(String, EvictionReason)>,
}

/// Accepts client connections and applies their control messages.
pub struct ConnectionManager {
    registry: Arc<BroadcastRegistry>,
    store: Arc<SnapshotStore>,
    scheduler: Option<Arc<TelemetryScheduler>>,
    auth_verifier: Option<Arc<dyn AuthVerifier>>,
    sweep_interval: Duration,
    liveness_timeout: Duration,
    outbound_buffer: usize,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<BroadcastRegistry>,
        store: Arc<SnapshotStore>,
        liveness: &LivenessConfig,
    ) -> Self {
        Self {
            registry,
            store,
            scheduler: None,
            auth_verifier: None,
            sweep_interval: Duration::from_secs(liveness.sweep_interval_seconds),
            liveness_timeout: Duration::from_secs(liveness.timeout_seconds),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    /// Serve `request_<kind>` messages from this scheduler's sources.
    pub fn with_scheduler(mut self, scheduler: Arc<TelemetryScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_auth_verifier(mut self, verifier: Arc<dyn AuthVerifier>) -> Self {
        self.auth_verifier = Some(verifier);
        self
    }

    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    /// Register a new client and queue its `connected` welcome.
    ///
    /// The receiver feeds the connection's writer task.
    pub async fn accept(&self) -> (Arc<ClientConnection>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let connection = Arc::new(ClientConnection::new(Uuid::new_v4().to_string(), tx));
        self.registry.register(Arc::clone(&connection)).await;

        tracing::info!(client_id = %connection.id, "Client connected");
        self.reply(&connection, Envelope::connected(&connection.id)).await;

        (connection, rx)
    }

    /// Record a liveness signal that carried no text (pong or binary frame).
    pub fn record_liveness(&self, connection: &ClientConnection) {
        connection.touch();
    }

    /// Apply one inbound text frame.
    ///
    /// Frames that fail to parse are logged and dropped; the connection stays up.
    pub async fn handle_text(&self, connection: &Arc<ClientConnection>, text: &str) {
        connection.touch();

        let inbound = match InboundMessage::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(client_id = %connection.id, error = %e, "Dropping unparseable message");
                return;
            }
        };
        let correlation_id = inbound.id;

        match inbound.message {
            ClientMessage::Subscribe { channel } => {
                connection.subscribe(&channel);
                tracing::debug!(client_id = %connection.id, channel = %channel, "Subscribed");
                self.reply(
                    connection,
                    Envelope::subscribed(&channel).with_correlation_id(correlation_id),
                )
                .await;
                self.push_latest(connection, &channel).await;
            }
            ClientMessage::Unsubscribe { channel } => {
                connection.unsubscribe(&channel);
                tracing::debug!(client_id = %connection.id, channel = %channel, "Unsubscribed");
                self.reply(
                    connection,
                    Envelope::unsubscribed(&channel).with_correlation_id(correlation_id),
                )
                .await;
            }
            ClientMessage::Ping => {
                self.reply(connection, Envelope::pong().with_correlation_id(correlation_id))
                    .await;
            }
            ClientMessage::Auth { payload } => {
                self.authenticate(connection, payload, correlation_id).await;
            }
            ClientMessage::Request { kind } => {
                self.serve_request(connection, kind, correlation_id).await;
            }
            ClientMessage::Unknown { message_type, .. } => {
                tracing::debug!(
                    client_id = %connection.id,
                    message_type = %message_type,
                    "Ignoring unknown message type"
                );
            }
        }
    }

    async fn authenticate(
        &self,
        connection: &Arc<ClientConnection>,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    ) {
        let identity = match &self.auth_verifier {
            None => Ok(payload),
            Some(verifier) => verifier.verify(&payload).await,
        };

        let envelope = match identity {
            Ok(identity) => {
                connection.set_auth_context(identity);
                tracing::info!(client_id = %connection.id, "Client authenticated");
                Envelope::auth_success()
            }
            Err(e) => {
                tracing::warn!(client_id = %connection.id, error = %e, "Authentication failed");
                Envelope::error("auth_failed", e.to_string())
            }
        };
        self.reply(connection, envelope.with_correlation_id(correlation_id))
            .await;
    }

    async fn serve_request(
        &self,
        connection: &Arc<ClientConnection>,
        kind: MetricKind,
        correlation_id: Option<String>,
    ) {
        let result = match &self.scheduler {
            Some(scheduler) => scheduler.poll_now(kind).await,
            None => Err(crate::telemetry::SourceError::NotConfigured(kind)),
        };

        let envelope = match result {
            Ok(snapshot) => Envelope::new(kind.update_type(), snapshot.payload),
            Err(e) => {
                tracing::warn!(client_id = %connection.id, kind = %kind, error = %e, "On-demand poll failed");
                Envelope::error("source_unavailable", e.to_string())
            }
        };
        self.reply(connection, envelope.with_correlation_id(correlation_id))
            .await;
    }

    /// Best-effort push of the newest stored snapshot for a channel.
    async fn push_latest(&self, connection: &Arc<ClientConnection>, channel: &str) {
        let Some(kind) = MetricKind::from_channel(channel) else {
            return;
        };
        if let Some(snapshot) = self.store.latest(kind) {
            self.reply(connection, Envelope::new(kind.update_type(), snapshot.payload))
                .await;
        }
    }

    async fn reply(&self, connection: &Arc<ClientConnection>, envelope: Envelope) {
        if let Err(e) = connection.send_envelope(&envelope) {
            tracing::warn!(
                client_id = %connection.id,
                envelope_type = %envelope.envelope_type,
                error = %e,
                "Failed to send reply"
            );
            self.registry
                .evict(&connection.id, EvictionReason::SendFailed)
                .await;
        }
    }

    /// Deliver to every client or to a channel's subscribers.
    pub async fn broadcast(&self, envelope: &Envelope, channel: Option<&str>) -> BroadcastReport {
        self.registry.broadcast(envelope, channel).await
    }

    /// Deliver to a single client; false when it is unknown or was evicted.
    pub async fn send_to(&self, client_id: &str, envelope: &Envelope) -> bool {
        self.registry.send_to(client_id, envelope).await
    }

    /// Drop a client whose connection has ended.
    pub async fn disconnect(&self, client_id: &str) {
        self.registry
            .evict(client_id, EvictionReason::Disconnected)
            .await;
    }

    /// One liveness pass over every client.
    ///
    /// Closed transports and clients silent past the timeout are marked
    /// without probing; the rest get a ping, and a failed ping marks them.
    /// Marked clients are evicted after the pass.
    pub async fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let connections = self.registry.connections().await;
        let mut report = SweepReport {
            checked: connections.len(),
            ..Default::default()
        };

        for connection in &connections {
            let reason = if !connection.is_open() {
                Some(EvictionReason::TransportClosed)
            } else if now.saturating_duration_since(connection.last_liveness())
                > self.liveness_timeout
            {
                Some(EvictionReason::LivenessTimeout)
            } else {
                report.pinged += 1;
                connection.ping().err().map(|e| {
                    tracing::debug!(client_id = %connection.id, error = %e, "Liveness ping failed");
                    EvictionReason::SendFailed
                })
            };

            if let Some(reason) = reason {
                report.evicted.push((connection.id.clone(), reason));
            }
        }

        for (client_id, reason) in &report.evicted {
            self.registry.evict(client_id, *reason).await;
        }

        if !report.evicted.is_empty() {
            tracing::info!(
                checked = report.checked,
                evicted = report.evicted.len(),
                "Liveness sweep evicted clients"
            );
        }
        report
    }

    /// Run [`sweep`](Self::sweep) every sweep interval until cancelled.
    pub fn start_sweeper(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.sweep_interval.clamp(
                Duration::from_millis(1),
                Duration::from_secs(MAX_DURATION_SECONDS),
            );
            let now = Instant::now();
            let start = now.checked_add(period).unwrap_or(now);
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                sweep_interval_seconds = period.as_secs(),
                timeout_seconds = self.liveness_timeout.as_secs(),
                "Liveness sweeper started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Liveness sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }
}
