//! Telemetry sources and history retention

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::telemetry::{Cadence, CadenceGate, MetricKind};

/// History retention plus the sources to poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub retention_seconds: u64,
    /// Per-kind cap, applied after retention
    pub max_snapshots: usize,
    pub sources: Vec<SourceConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            retention_seconds: 3600,
            max_snapshots: 720,
            sources: Vec::new(),
        }
    }
}

/// One `[[telemetry.sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: MetricKind,
    /// Tick interval; the kind's default cadence applies when this and `gate` are unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<CadenceGate>,
    #[serde(default = "default_source_timeout")]
    pub timeout_seconds: u64,
    pub provider: ProviderConfig,
}

fn default_source_timeout() -> u64 {
    5
}

impl SourceConfig {
    /// Effective cadence.
    ///
    /// Without `interval_seconds` or `gate` the kind's default applies.
    /// Otherwise the configured values are used as given, so an interval
    /// without a gate is ungated.
    pub fn cadence(&self) -> Cadence {
        let default = self.kind.default_cadence();
        if self.interval_seconds.is_none() && self.gate.is_none() {
            return default;
        }
        Cadence {
            interval: self
                .interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(default.interval),
            gate: self.gate,
        }
    }
}

/// Where a source gets its payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Run a program and parse its stdout as JSON
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// GET a JSON document
    Http { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sources() {
        let toml = r#"
        retention_seconds = 600

        [[sources]]
        kind = "host_metrics"
        provider = { type = "command", program = "pulse-sampler", args = ["--json"] }

        [[sources]]
        kind = "cluster_status"
        interval_seconds = 15
        gate = { period_seconds = 120, window_seconds = 15 }
        timeout_seconds = 10
        provider = { type = "http", url = "http://localhost:9090/status" }
        "#;

        let config: TelemetryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.retention_seconds, 600);
        assert_eq!(config.max_snapshots, 720);
        assert_eq!(config.sources.len(), 2);

        let host = &config.sources[0];
        assert_eq!(host.timeout_seconds, 5);
        assert_eq!(
            host.provider,
            ProviderConfig::Command {
                program: "pulse-sampler".into(),
                args: vec!["--json".into()]
            }
        );

        let cluster = &config.sources[1];
        assert_eq!(cluster.timeout_seconds, 10);
        assert_eq!(
            cluster.cadence(),
            Cadence::gated(Duration::from_secs(15), CadenceGate::new(120, 15))
        );
    }

    #[test]
    fn test_cadence_falls_back_to_kind_default() {
        let source = SourceConfig {
            kind: MetricKind::ContainerStatus,
            interval_seconds: None,
            gate: None,
            timeout_seconds: 5,
            provider: ProviderConfig::Http {
                url: "http://x".into(),
            },
        };
        assert_eq!(source.cadence(), MetricKind::ContainerStatus.default_cadence());
    }

    #[test]
    fn test_interval_without_gate_is_ungated() {
        let source = SourceConfig {
            kind: MetricKind::ContainerStatus,
            interval_seconds: Some(30),
            gate: None,
            timeout_seconds: 5,
            provider: ProviderConfig::Http {
                url: "http://x".into(),
            },
        };
        assert_eq!(source.cadence(), Cadence::every(Duration::from_secs(30)));
    }

    #[test]
    fn test_unknown_provider_type_rejected() {
        let toml = r#"
        [[sources]]
        kind = "host_metrics"
        provider = { type = "carrier_pigeon" }
        "#;
        assert!(toml::from_str::<TelemetryConfig>(toml).is_err());
    }
}
