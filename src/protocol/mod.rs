//! Wire protocol shared by the hub and the reconnecting client.
//!
//! Both directions carry JSON text frames:
//!
//! - client → hub: `{ "type": "subscribe", "data": { "channel": "metrics" }, "id": "1" }`
//! - hub → client: `{ "type": "metrics_update", "data": {...}, "timestamp": "...", "correlationId": "1" }`

mod envelope;
mod error;
mod inbound;

pub use envelope::{Envelope, EnvelopeType};
pub use error::ProtocolError;
pub use inbound::{ClientMessage, InboundMessage};

/// Channel for log lines pushed by the embedding application.
pub const LOGS_CHANNEL: &str = "logs";
