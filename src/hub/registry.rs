//! Connected clients and channel fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::connection::ClientConnection;
use super::error::RegistryError;
use crate::protocol::Envelope;

/// Why a client was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// A frame could not be queued
    SendFailed,
    /// No liveness signal within the timeout
    LivenessTimeout,
    /// Transport found closed during a sweep
    TransportClosed,
    /// The connection ended normally
    Disconnected,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::SendFailed => "send_failed",
            EvictionReason::LivenessTimeout => "liveness_timeout",
            EvictionReason::TransportClosed => "transport_closed",
            EvictionReason::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients selected for delivery
    pub recipients: usize,
    /// Clients whose queue accepted the frame
    pub delivered: usize,
    /// Clients evicted because delivery failed
    pub evicted: usize,
}

/// Owns the set of connected clients.
///
/// The map lock is never held across a send: broadcast copies the recipient
/// handles and releases the lock before queuing anything.
pub struct BroadcastRegistry {
    clients: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Add a client. Replaces any client registered under the same id.
    pub async fn register(&self, connection: Arc<ClientConnection>) {
        let count = {
            let mut clients = self.clients.write().await;
            clients.insert(connection.id.clone(), connection);
            clients.len()
        };
        metrics::gauge!("pulse_clients_connected").set(count as f64);
    }

    /// Remove a client without touching its transport.
    pub async fn remove(&self, client_id: &str) -> Option<Arc<ClientConnection>> {
        let (removed, count) = {
            let mut clients = self.clients.write().await;
            let removed = clients.remove(client_id);
            (removed, clients.len())
        };
        metrics::gauge!("pulse_clients_connected").set(count as f64);
        removed
    }

    /// Remove a client and close its transport.
    ///
    /// Returns `false` if the client was already gone.
    pub async fn evict(&self, client_id: &str, reason: EvictionReason) -> bool {
        let Some(connection) = self.remove(client_id).await else {
            return false;
        };
        connection.close();

        metrics::counter!("pulse_evictions_total", "reason" => reason.as_str()).increment(1);
        if reason == EvictionReason::Disconnected {
            tracing::debug!(client_id, "Client disconnected");
        } else {
            tracing::info!(client_id, reason = %reason, "Evicted client");
        }
        true
    }

    pub async fn get(&self, client_id: &str) -> Option<Arc<ClientConnection>> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Subscribe a client to a channel. Returns `false` if it already was.
    pub async fn subscribe(&self, client_id: &str, channel: &str) -> Result<bool, RegistryError> {
        self.get(client_id)
            .await
            .map(|connection| connection.subscribe(channel))
            .ok_or_else(|| RegistryError::UnknownClient(client_id.to_string()))
    }

    /// Unsubscribe a client from a channel. Returns `false` if it was not subscribed.
    pub async fn unsubscribe(&self, client_id: &str, channel: &str) -> Result<bool, RegistryError> {
        self.get(client_id)
            .await
            .map(|connection| connection.unsubscribe(channel))
            .ok_or_else(|| RegistryError::UnknownClient(client_id.to_string()))
    }

    /// Deliver an envelope to every client, or only to a channel's subscribers.
    ///
    /// A client whose queue rejects the frame is evicted on the spot; the
    /// remaining recipients still receive it.
    pub async fn broadcast(&self, envelope: &Envelope, channel: Option<&str>) -> BroadcastReport {
        let json: Arc<str> = match envelope.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(
                    envelope_type = %envelope.envelope_type,
                    error = %e,
                    "Failed to serialize envelope"
                );
                return BroadcastReport::default();
            }
        };

        let recipients: Vec<Arc<ClientConnection>> = {
            let clients = self.clients.read().await;
            clients
                .values()
                .filter(|c| channel.map_or(true, |channel| c.is_subscribed(channel)))
                .cloned()
                .collect()
        };

        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..Default::default()
        };

        for connection in recipients {
            match connection.send_text(Arc::clone(&json)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        client_id = %connection.id,
                        channel = channel.unwrap_or("*"),
                        error = %e,
                        "Failed to deliver broadcast"
                    );
                    if self.evict(&connection.id, EvictionReason::SendFailed).await {
                        report.evicted += 1;
                    }
                }
            }
        }

        metrics::counter!("pulse_broadcasts_total", "channel" => channel.unwrap_or("*").to_string())
            .increment(1);
        tracing::trace!(
            envelope_type = %envelope.envelope_type,
            channel = channel.unwrap_or("*"),
            recipients = report.recipients,
            delivered = report.delivered,
            "Broadcast complete"
        );

        report
    }

    /// Send to one client. No-op when the client is unknown or closed.
    ///
    /// Returns whether the frame was queued. A failed send evicts the client.
    pub async fn send_to(&self, client_id: &str, envelope: &Envelope) -> bool {
        let Some(connection) = self.get(client_id).await else {
            return false;
        };
        if !connection.is_open() {
            return false;
        }

        match connection.send_envelope(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(client_id, error = %e, "Failed to send to client");
                self.evict(client_id, EvictionReason::SendFailed).await;
                false
            }
        }
    }

    /// Point-in-time copy of every client handle.
    pub async fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.clients.read().await.values().cloned().collect()
    }

    /// Ids of the clients subscribed to `channel`, sorted.
    pub async fn subscribers(&self, channel: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.is_subscribed(channel))
            .map(|c| c.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
