//! Server → client envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Intent of an outbound envelope.
///
/// Unrecognized type strings deserialize into [`EnvelopeType::Other`] so that a
/// consumer built against an older hub keeps working when new push types appear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeType {
    /// Welcome message carrying the assigned client id
    Connected,
    /// Subscription acknowledged
    Subscribed,
    /// Unsubscription acknowledged
    Unsubscribed,
    /// Reply to an application-level ping
    Pong,
    /// Auth payload attached to the connection
    AuthSuccess,
    /// Request could not be served
    Error,
    /// Host metrics snapshot
    MetricsUpdate,
    /// Container status snapshot
    ContainerStatusUpdate,
    /// Cluster status snapshot
    ClusterStatusUpdate,
    /// Model runner status snapshot
    ModelStatusUpdate,
    /// Any other type string
    Other(String),
}

impl EnvelopeType {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeType::Connected => "connected",
            EnvelopeType::Subscribed => "subscribed",
            EnvelopeType::Unsubscribed => "unsubscribed",
            EnvelopeType::Pong => "pong",
            EnvelopeType::AuthSuccess => "auth_success",
            EnvelopeType::Error => "error",
            EnvelopeType::MetricsUpdate => "metrics_update",
            EnvelopeType::ContainerStatusUpdate => "container_status_update",
            EnvelopeType::ClusterStatusUpdate => "cluster_status_update",
            EnvelopeType::ModelStatusUpdate => "model_status_update",
            EnvelopeType::Other(other) => other,
        }
    }
}

impl From<String> for EnvelopeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "connected" => EnvelopeType::Connected,
            "subscribed" => EnvelopeType::Subscribed,
            "unsubscribed" => EnvelopeType::Unsubscribed,
            "pong" => EnvelopeType::Pong,
            "auth_success" => EnvelopeType::AuthSuccess,
            "error" => EnvelopeType::Error,
            "metrics_update" => EnvelopeType::MetricsUpdate,
            "container_status_update" => EnvelopeType::ContainerStatusUpdate,
            "cluster_status_update" => EnvelopeType::ClusterStatusUpdate,
            "model_status_update" => EnvelopeType::ModelStatusUpdate,
            _ => EnvelopeType::Other(value),
        }
    }
}

impl From<&str> for EnvelopeType {
    fn from(value: &str) -> Self {
        EnvelopeType::from(value.to_string())
    }
}

impl From<EnvelopeType> for String {
    fn from(value: EnvelopeType) -> Self {
        match value {
            EnvelopeType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EnvelopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire unit sent from the hub to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub envelope_type: EnvelopeType,
    #[serde(default)]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    /// Echo of the inbound request `id`, when the envelope answers one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Envelope {
    /// Create an envelope stamped with the current time.
    pub fn new(envelope_type: impl Into<EnvelopeType>, data: Value) -> Self {
        Self {
            envelope_type: envelope_type.into(),
            data,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    /// Attach the id of the request this envelope answers.
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn connected(client_id: &str) -> Self {
        Self::new(EnvelopeType::Connected, json!({ "clientId": client_id }))
    }

    pub fn subscribed(channel: &str) -> Self {
        Self::new(EnvelopeType::Subscribed, json!({ "channel": channel }))
    }

    pub fn unsubscribed(channel: &str) -> Self {
        Self::new(EnvelopeType::Unsubscribed, json!({ "channel": channel }))
    }

    pub fn pong() -> Self {
        Self::new(EnvelopeType::Pong, json!({}))
    }

    pub fn auth_success() -> Self {
        Self::new(EnvelopeType::AuthSuccess, json!({}))
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(
            EnvelopeType::Error,
            json!({ "code": code, "message": message.into() }),
        )
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
