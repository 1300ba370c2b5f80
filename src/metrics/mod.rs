//! # Metrics Collection Module
//!
//! Prometheus export for the hub.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `pulse_broadcasts_total{channel}` - Broadcasts issued (`*` for all clients)
//! - `pulse_evictions_total{reason}` - Clients removed from the registry
//! - `pulse_source_polls_total{kind, outcome}` - Metric source polls
//!
//! **Histograms:**
//! - `pulse_source_poll_seconds{kind}` - Metric source poll duration
//!
//! **Gauges:**
//! - `pulse_clients_connected` - Registered clients
//! - `pulse_snapshots_stored{kind}` - Snapshots held in history

pub mod handler;

pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::hub::BroadcastRegistry;
use crate::telemetry::SnapshotStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;

/// Computes derived gauges and renders the Prometheus exposition.
pub struct MetricsCollector {
    registry: Arc<BroadcastRegistry>,
    store: Arc<SnapshotStore>,
    start_time: Instant,
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<BroadcastRegistry>,
        store: Arc<SnapshotStore>,
        start_time: Instant,
        prometheus_handle: PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            store,
            start_time,
            prometheus_handle,
        }
    }

    /// Refresh gauges derived from hub state.
    pub async fn update_gauges(&self) {
        metrics::gauge!("pulse_clients_connected").set(self.registry.client_count().await as f64);
        for (kind, count) in self.store.counts() {
            metrics::gauge!("pulse_snapshots_stored", "kind" => kind.as_str()).set(count as f64);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Install the global Prometheus recorder.
///
/// Poll durations use buckets from 10ms to 30s.
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let poll_buckets = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("pulse_source_poll_seconds".to_string()),
            poll_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Install the global recorder, or fall back to a detached handle when one
/// is already installed (tests, embedding).
pub fn prometheus_handle() -> PrometheusHandle {
    setup_metrics().unwrap_or_else(|e| {
        tracing::debug!("Metrics already initialized, creating new handle: {}", e);
        PrometheusBuilder::new().build_recorder().handle()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{MetricKind, Snapshot};
    use std::time::Duration;

    #[test]
    fn test_gauges_rendered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let store = Arc::new(SnapshotStore::new(Duration::from_secs(60), 10));
        store.append(Snapshot::new(
            MetricKind::ModelStatus,
            serde_json::json!({}),
        ));
        let collector = MetricsCollector::new(
            Arc::new(BroadcastRegistry::new()),
            store,
            Instant::now(),
            recorder.handle(),
        );

        metrics::with_local_recorder(&recorder, || {
            futures::executor::block_on(collector.update_gauges())
        });
        let rendered = collector.render_metrics();

        assert!(rendered.contains("pulse_clients_connected 0"));
        assert!(rendered.contains("pulse_snapshots_stored{kind=\"model_status\"} 1"));
        assert!(collector.uptime_seconds() < 1);
    }
}
