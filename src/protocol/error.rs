//! Protocol error types

use thiserror::Error;

/// Inbound frames the hub could not interpret.
///
/// These are logged and dropped; they never close a connection.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("'{message_type}' message is missing '{field}'")]
    MissingField {
        message_type: String,
        field: &'static str,
    },

    #[error("binary frames are not supported")]
    BinaryFrame,
}
