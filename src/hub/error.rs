//! Hub error types

use thiserror::Error;

/// Failure to hand a frame to a client's writer task.
///
/// Any of these evicts the client.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("connection is closed")]
    Closed,

    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Registry operations addressed to a client id.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client '{0}' is not connected")]
    UnknownClient(String),
}

/// Rejection from an [`AuthVerifier`](super::AuthVerifier).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
}
