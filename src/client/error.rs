//! Reconnecting client error types

use thiserror::Error;

/// Errors surfaced through [`ClientHandler::on_error`](super::ClientHandler::on_error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Opening the transport failed
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// The live transport reported an error
    #[error("transport error: {0}")]
    Transport(String),

    /// Reconnect budget used up; call `connect()` to start over
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}
