//! Server side of the telemetry stream.
//!
//! [`BroadcastRegistry`] owns the connected clients and their subscriptions,
//! [`ConnectionManager`] speaks the control protocol on top of it, and
//! [`websocket`] bridges axum sockets to both.

mod auth;
mod connection;
mod error;
mod manager;
mod registry;
pub mod websocket;

pub use auth::{AuthVerifier, StaticTokenVerifier};
pub use connection::{ClientConnection, Outbound};
pub use error::{AuthError, RegistryError, TransportError};
pub use manager::{ConnectionManager, SweepReport, DEFAULT_OUTBOUND_BUFFER};
pub use registry::{BroadcastRegistry, BroadcastReport, EvictionReason};
