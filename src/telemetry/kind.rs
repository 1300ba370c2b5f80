//! Metric kinds and their channel/wire names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::cadence::{Cadence, CadenceGate};
use crate::protocol::EnvelopeType;

/// Category of telemetry produced by a [`MetricSource`](super::MetricSource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// CPU, memory, disk and GPU utilisation of the host
    HostMetrics,
    /// Container runtime status
    ContainerStatus,
    /// Cluster node and workload status
    ClusterStatus,
    /// Model runner status (loaded models, queue depth)
    ModelStatus,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::HostMetrics,
        MetricKind::ContainerStatus,
        MetricKind::ClusterStatus,
        MetricKind::ModelStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HostMetrics => "host_metrics",
            MetricKind::ContainerStatus => "container_status",
            MetricKind::ClusterStatus => "cluster_status",
            MetricKind::ModelStatus => "model_status",
        }
    }

    /// Channel that receives this kind's pushes.
    pub fn channel(&self) -> &'static str {
        match self {
            MetricKind::HostMetrics => "metrics",
            MetricKind::ContainerStatus => "container-status",
            MetricKind::ClusterStatus => "cluster-status",
            MetricKind::ModelStatus => "model-status",
        }
    }

    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.channel() == channel)
    }

    /// Envelope type of a push carrying this kind's snapshot.
    pub fn update_type(&self) -> EnvelopeType {
        match self {
            MetricKind::HostMetrics => EnvelopeType::MetricsUpdate,
            MetricKind::ContainerStatus => EnvelopeType::ContainerStatusUpdate,
            MetricKind::ClusterStatus => EnvelopeType::ClusterStatusUpdate,
            MetricKind::ModelStatus => EnvelopeType::ModelStatusUpdate,
        }
    }

    /// Inbound message type that pulls a fresh snapshot of this kind.
    pub fn request_type(&self) -> &'static str {
        match self {
            MetricKind::HostMetrics => "request_metrics",
            MetricKind::ContainerStatus => "request_container_status",
            MetricKind::ClusterStatus => "request_cluster_status",
            MetricKind::ModelStatus => "request_model_status",
        }
    }

    pub fn from_request_type(message_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.request_type() == message_type)
    }

    /// Polling cadence used when a source does not configure its own.
    ///
    /// Host metrics run every 10s. The low-frequency kinds tick at the same
    /// rate but only fire inside a short window of a longer period.
    pub fn default_cadence(&self) -> Cadence {
        let tick = Duration::from_secs(10);
        match self {
            MetricKind::HostMetrics => Cadence::every(tick),
            MetricKind::ContainerStatus | MetricKind::ClusterStatus => {
                Cadence::gated(tick, CadenceGate::new(60, 10))
            }
            MetricKind::ModelStatus => Cadence::gated(tick, CadenceGate::new(30, 10)),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    /// Accepts either the kind name (`host_metrics`) or its channel (`metrics`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower || kind.channel() == lower)
            .ok_or_else(|| format!("Unknown metric kind: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_round_trip() {
        for kind in MetricKind::ALL {
            assert_eq!(MetricKind::from_channel(kind.channel()), Some(kind));
            assert_eq!(MetricKind::from_request_type(kind.request_type()), Some(kind));
        }
        assert_eq!(MetricKind::from_channel("logs"), None);
    }

    #[test]
    fn test_from_str_accepts_kind_or_channel() {
        assert_eq!(
            "host_metrics".parse::<MetricKind>().unwrap(),
            MetricKind::HostMetrics
        );
        assert_eq!(
            "container-status".parse::<MetricKind>().unwrap(),
            MetricKind::ContainerStatus
        );
        assert!("gpu".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&MetricKind::ClusterStatus).unwrap();
        assert_eq!(json, "\"cluster_status\"");
    }

    #[test]
    fn test_default_cadences() {
        let host = MetricKind::HostMetrics.default_cadence();
        assert_eq!(host.interval, Duration::from_secs(10));
        assert!(host.gate.is_none());

        let cluster = MetricKind::ClusterStatus.default_cadence();
        assert_eq!(cluster.interval, Duration::from_secs(10));
        assert_eq!(cluster.gate, Some(CadenceGate::new(60, 10)));
    }
}
