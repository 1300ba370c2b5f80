//! Configuration module for Pulse
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`PULSE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use pulse::config::PulseConfig;
//!
//! let config = PulseConfig::default();
//! assert_eq!(config.server.port, 8600);
//!
//! let toml = r#"
//! [liveness]
//! sweep_interval_seconds = 10
//! timeout_seconds = 20
//! "#;
//! let config: PulseConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.liveness.timeout_seconds, 20);
//! ```

pub mod client;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod server;
pub mod telemetry;

pub use client::ClientConfig;
pub use error::ConfigError;
pub use liveness::LivenessConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;
pub use telemetry::{ProviderConfig, SourceConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Longest duration accepted for any `*_seconds` setting (ten years).
pub const MAX_DURATION_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Example configuration written by `pulse config init`.
pub const EXAMPLE_CONFIG: &str = include_str!("../../pulse.example.toml");

/// Unified configuration for the hub and its clients.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PulseConfig {
    /// HTTP / WebSocket listener
    pub server: ServerConfig,
    /// Client liveness sweep
    pub liveness: LivenessConfig,
    /// Snapshot retention and metric sources
    pub telemetry: TelemetryConfig,
    /// Reconnecting client used by `pulse watch`
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

impl PulseConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `PULSE_*` environment variable overrides
    ///
    /// Invalid values are ignored and the current value is kept.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `PULSE_*` overrides read through `lookup`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PULSE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(host) = lookup("PULSE_HOST") {
            self.server.host = host;
        }

        if let Some(level) = lookup("PULSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PULSE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Some(url) = lookup("PULSE_CLIENT_URL") {
            self.client.url = url;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "port must be non-zero"));
        }
        if self.server.outbound_buffer == 0 {
            return Err(invalid(
                "server.outbound_buffer",
                "outbound buffer must hold at least one frame",
            ));
        }

        if self.liveness.sweep_interval_seconds == 0 {
            return Err(invalid(
                "liveness.sweep_interval_seconds",
                "sweep interval must be non-zero",
            ));
        }
        if self.liveness.timeout_seconds == 0 {
            return Err(invalid(
                "liveness.timeout_seconds",
                "timeout must be non-zero",
            ));
        }
        check_upper_bound(
            "liveness.sweep_interval_seconds",
            self.liveness.sweep_interval_seconds,
        )?;
        check_upper_bound("liveness.timeout_seconds", self.liveness.timeout_seconds)?;

        if self.telemetry.retention_seconds == 0 {
            return Err(invalid(
                "telemetry.retention_seconds",
                "retention must be non-zero",
            ));
        }
        check_upper_bound(
            "telemetry.retention_seconds",
            self.telemetry.retention_seconds,
        )?;
        if self.telemetry.max_snapshots == 0 {
            return Err(invalid(
                "telemetry.max_snapshots",
                "max_snapshots must be non-zero",
            ));
        }

        let mut seen = HashSet::new();
        for (i, source) in self.telemetry.sources.iter().enumerate() {
            if !seen.insert(source.kind) {
                return Err(ConfigError::DuplicateSource(source.kind));
            }
            validate_source(i, source)?;
        }

        if !(self.client.url.starts_with("ws://") || self.client.url.starts_with("wss://")) {
            return Err(invalid("client.url", "URL must use ws:// or wss://"));
        }

        Ok(())
    }
}

fn validate_source(index: usize, source: &SourceConfig) -> Result<(), ConfigError> {
    let field = |name: &str| format!("telemetry.sources[{}].{}", index, name);

    if source.interval_seconds == Some(0) {
        return Err(invalid(field("interval_seconds"), "interval must be non-zero"));
    }
    if source.timeout_seconds == 0 {
        return Err(invalid(field("timeout_seconds"), "timeout must be non-zero"));
    }
    if let Some(interval) = source.interval_seconds {
        check_upper_bound(&field("interval_seconds"), interval)?;
    }
    check_upper_bound(&field("timeout_seconds"), source.timeout_seconds)?;
    if let Some(gate) = &source.gate {
        if gate.window_seconds == 0 || gate.window_seconds >= gate.period_seconds {
            return Err(invalid(
                field("gate"),
                "window_seconds must be non-zero and less than period_seconds",
            ));
        }
    }

    match &source.provider {
        ProviderConfig::Command { program, .. } if program.trim().is_empty() => {
            Err(invalid(field("provider.program"), "program cannot be empty"))
        }
        ProviderConfig::Http { url } if url.trim().is_empty() => {
            Err(invalid(field("provider.url"), "URL cannot be empty"))
        }
        _ => Ok(()),
    }
}

fn check_upper_bound(field: &str, seconds: u64) -> Result<(), ConfigError> {
    if seconds > MAX_DURATION_SECONDS {
        return Err(invalid(field, "duration must not exceed ten years"));
    }
    Ok(())
}

fn invalid(field: impl Into<String>, message: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        message: message.to_string(),
    }
}
