//! Client → server control messages.

use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ProtocolError;
use crate::telemetry::MetricKind;

/// Raw `{ type, data, id? }` shape before it is interpreted.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    channel: Option<String>,
}

/// Control message sent by a client, keyed by its `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
    Auth { payload: Value },
    /// `request_<kind>`: pull a fresh snapshot outside the normal cadence
    Request { kind: MetricKind },
    /// Any type the hub does not understand, kept verbatim
    Unknown { message_type: String, data: Value },
}

impl ClientMessage {
    /// Wire name of this message.
    pub fn message_type(&self) -> &str {
        match self {
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Unsubscribe { .. } => "unsubscribe",
            ClientMessage::Ping => "ping",
            ClientMessage::Auth { .. } => "auth",
            ClientMessage::Request { kind } => kind.request_type(),
            ClientMessage::Unknown { message_type, .. } => message_type,
        }
    }

    /// Build the JSON value a client sends for this message.
    pub fn to_value(&self, id: Option<&str>) -> Value {
        let data = match self {
            ClientMessage::Subscribe { channel } | ClientMessage::Unsubscribe { channel } => {
                json!({ "channel": channel })
            }
            ClientMessage::Auth { payload } => payload.clone(),
            ClientMessage::Unknown { data, .. } => data.clone(),
            ClientMessage::Ping | ClientMessage::Request { .. } => json!({}),
        };

        let mut value = json!({ "type": self.message_type(), "data": data });
        if let Some(id) = id {
            value["id"] = Value::String(id.to_string());
        }
        value
    }
}

/// A parsed inbound message plus its optional request id.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message: ClientMessage,
    pub id: Option<String>,
}

impl InboundMessage {
    /// Parse a text frame.
    ///
    /// Frames that are not JSON objects with a string `type`, and subscribe or
    /// unsubscribe messages without a channel, are protocol errors. Unrecognized
    /// types are not errors; they come back as [`ClientMessage::Unknown`].
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawMessage = serde_json::from_str(text)?;

        let message = match raw.message_type.as_str() {
            "subscribe" => ClientMessage::Subscribe {
                channel: channel_of(&raw)?,
            },
            "unsubscribe" => ClientMessage::Unsubscribe {
                channel: channel_of(&raw)?,
            },
            "ping" => ClientMessage::Ping,
            "auth" => ClientMessage::Auth {
                payload: raw.data.clone(),
            },
            other => match MetricKind::from_request_type(other) {
                Some(kind) => ClientMessage::Request { kind },
                None => ClientMessage::Unknown {
                    message_type: raw.message_type.clone(),
                    data: raw.data.clone(),
                },
            },
        };

        Ok(Self {
            message,
            id: raw.id.as_ref().and_then(correlation_id),
        })
    }
}

/// Scalar ids are echoed back as strings; objects and arrays are ignored.
fn correlation_id(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn channel_of(raw: &RawMessage) -> Result<String, ProtocolError> {
    raw.data
        .get("channel")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| raw.channel.clone())
        .filter(|channel| !channel.is_empty())
        .ok_or_else(|| ProtocolError::MissingField {
            message_type: raw.message_type.clone(),
            field: "channel",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe_from_data() {
        let msg =
            InboundMessage::parse(r#"{"type":"subscribe","data":{"channel":"metrics"},"id":"7"}"#)
                .unwrap();
        assert_eq!(
            msg.message,
            ClientMessage::Subscribe {
                channel: "metrics".into()
            }
        );
        assert_eq!(msg.id.as_deref(), Some("7"));
    }

    #[test]
    fn test_parse_subscribe_top_level_channel() {
        let msg = InboundMessage::parse(r#"{"type":"unsubscribe","channel":"logs"}"#).unwrap();
        assert_eq!(
            msg.message,
            ClientMessage::Unsubscribe {
                channel: "logs".into()
            }
        );
    }

    #[test]
    fn test_subscribe_without_channel_is_error() {
        let err = InboundMessage::parse(r#"{"type":"subscribe","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField { field: "channel", .. }));
    }

    #[test]
    fn test_parse_ping_without_data() {
        let msg = InboundMessage::parse(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.message, ClientMessage::Ping);
        assert!(msg.id.is_none());
    }

    #[test]
    fn test_non_string_ids_are_stringified() {
        let msg = InboundMessage::parse(r#"{"type":"ping","id":1}"#).unwrap();
        assert_eq!(msg.message, ClientMessage::Ping);
        assert_eq!(msg.id.as_deref(), Some("1"));

        let msg = InboundMessage::parse(r#"{"type":"ping","id":true}"#).unwrap();
        assert_eq!(msg.id.as_deref(), Some("true"));

        let msg = InboundMessage::parse(r#"{"type":"ping","id":{"nested":1}}"#).unwrap();
        assert_eq!(msg.message, ClientMessage::Ping);
        assert!(msg.id.is_none());

        let msg = InboundMessage::parse(r#"{"type":"ping","id":null}"#).unwrap();
        assert!(msg.id.is_none());
    }

    #[test]
    fn test_parse_auth_keeps_payload_opaque() {
        let msg = InboundMessage::parse(r#"{"type":"auth","data":{"token":"abc","n":1}}"#).unwrap();
        match msg.message {
            ClientMessage::Auth { payload } => {
                assert_eq!(payload["token"], "abc");
                assert_eq!(payload["n"], 1);
            }
            other => panic!("Expected Auth, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_variants() {
        let msg = InboundMessage::parse(r#"{"type":"request_metrics"}"#).unwrap();
        assert_eq!(
            msg.message,
            ClientMessage::Request {
                kind: MetricKind::HostMetrics
            }
        );

        let msg = InboundMessage::parse(r#"{"type":"request_cluster_status"}"#).unwrap();
        assert_eq!(
            msg.message,
            ClientMessage::Request {
                kind: MetricKind::ClusterStatus
            }
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_raw() {
        let msg = InboundMessage::parse(r#"{"type":"request_gpu_fans","data":{"x":1}}"#).unwrap();
        match msg.message {
            ClientMessage::Unknown { message_type, data } => {
                assert_eq!(message_type, "request_gpu_fans");
                assert_eq!(data["x"], 1);
            }
            other => panic!("Expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(
            InboundMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(InboundMessage::parse(r#"{"data":{}}"#).is_err());
        assert!(InboundMessage::parse(r#"{"type":42}"#).is_err());
        assert!(InboundMessage::parse("[1,2,3]").is_err());
    }

    #[test]
    fn test_to_value_matches_parse() {
        let outgoing = ClientMessage::Subscribe {
            channel: "cluster-status".into(),
        };
        let text = outgoing.to_value(Some("abc")).to_string();
        let parsed = InboundMessage::parse(&text).unwrap();
        assert_eq!(parsed.message, outgoing);
        assert_eq!(parsed.id.as_deref(), Some("abc"));
    }
}
