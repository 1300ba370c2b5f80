//! Liveness sweep configuration

use serde::{Deserialize, Serialize};

/// How often clients are checked and how long they may stay silent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LivenessConfig {
    pub sweep_interval_seconds: u64,
    /// Silence longer than this evicts the client without a ping
    pub timeout_seconds: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 30,
            timeout_seconds: 60,
        }
    }
}
