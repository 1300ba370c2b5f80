//! Pulse - real-time telemetry distribution hub
//!
//! This library polls host, container, cluster and model runner metrics on
//! fixed cadences, keeps a bounded history of snapshots, and fans them out to
//! WebSocket clients subscribed to per-kind channels.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod hub;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod telemetry;
