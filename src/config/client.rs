//! Reconnecting client configuration

use serde::{Deserialize, Serialize};

/// Settings for `pulse watch` and other stream consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8600/ws".to_string(),
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 5,
        }
    }
}
