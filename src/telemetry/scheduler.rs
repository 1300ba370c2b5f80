//! Periodic polling of metric sources and fan-out of fresh snapshots.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::source::build_source;
use super::{Cadence, MetricKind, MetricSource, Snapshot, SnapshotStore, SourceError};
use crate::config::TelemetryConfig;
use crate::hub::BroadcastRegistry;
use crate::protocol::Envelope;

#[derive(Clone)]
struct ScheduledSource {
    source: Arc<dyn MetricSource>,
    cadence: Cadence,
}

/// Result of one scheduler tick for one kind.
#[derive(Debug)]
pub enum TickOutcome {
    /// Cadence gate was closed, or no source is registered
    Skipped,
    /// Snapshot stored and broadcast to `delivered` subscribers
    Published { snapshot: Snapshot, delivered: usize },
    /// Source failed; nothing stored or broadcast this cycle
    Failed(SourceError),
}

/// Background service that polls each metric kind on its own cadence.
pub struct TelemetryScheduler {
    sources: BTreeMap<MetricKind, ScheduledSource>,
    store: Arc<SnapshotStore>,
    registry: Arc<BroadcastRegistry>,
}

impl TelemetryScheduler {
    /// Create a scheduler with no sources.
    pub fn new(store: Arc<SnapshotStore>, registry: Arc<BroadcastRegistry>) -> Self {
        Self {
            sources: BTreeMap::new(),
            store,
            registry,
        }
    }

    /// Create a scheduler with the sources declared in configuration.
    pub fn from_config(
        config: &TelemetryConfig,
        store: Arc<SnapshotStore>,
        registry: Arc<BroadcastRegistry>,
    ) -> Self {
        config
            .sources
            .iter()
            .fold(Self::new(store, registry), |scheduler, source| {
                scheduler.with_source(build_source(source), source.cadence())
            })
    }

    /// Register a source. A later source for the same kind replaces the earlier one.
    pub fn with_source(mut self, source: Arc<dyn MetricSource>, cadence: Cadence) -> Self {
        let kind = source.kind();
        if self
            .sources
            .insert(kind, ScheduledSource { source, cadence })
            .is_some()
        {
            tracing::warn!(kind = %kind, "Replacing previously registered metric source");
        }
        self
    }

    /// Kinds with a registered source.
    pub fn kinds(&self) -> Vec<MetricKind> {
        self.sources.keys().copied().collect()
    }

    pub fn cadence(&self, kind: MetricKind) -> Option<Cadence> {
        self.sources.get(&kind).map(|s| s.cadence)
    }

    /// Run one scheduled tick for `kind` as of `now`.
    ///
    /// Never retries: a failed poll is retried by the next tick.
    pub async fn tick(&self, kind: MetricKind, now: DateTime<Utc>) -> TickOutcome {
        let Some(scheduled) = self.sources.get(&kind) else {
            return TickOutcome::Skipped;
        };

        if !scheduled.cadence.should_fire(now) {
            tracing::trace!(kind = %kind, "Cadence gate closed, skipping tick");
            return TickOutcome::Skipped;
        }

        match self.poll_and_store(kind, scheduled).await {
            Ok(snapshot) => {
                let envelope = Envelope::new(kind.update_type(), snapshot.payload.clone());
                let report = self
                    .registry
                    .broadcast(&envelope, Some(kind.channel()))
                    .await;
                tracing::debug!(
                    kind = %kind,
                    delivered = report.delivered,
                    evicted = report.evicted,
                    "Published snapshot"
                );
                TickOutcome::Published {
                    snapshot,
                    delivered: report.delivered,
                }
            }
            Err(error) => {
                tracing::warn!(kind = %kind, error = %error, "Metric source poll failed, skipping cycle");
                TickOutcome::Failed(error)
            }
        }
    }

    /// Poll `kind` immediately, outside its cadence, and store the result.
    ///
    /// Nothing is broadcast; the caller decides who receives the snapshot.
    pub async fn poll_now(&self, kind: MetricKind) -> Result<Snapshot, SourceError> {
        let scheduled = self
            .sources
            .get(&kind)
            .ok_or(SourceError::NotConfigured(kind))?;
        self.poll_and_store(kind, scheduled).await
    }

    async fn poll_and_store(
        &self,
        kind: MetricKind,
        scheduled: &ScheduledSource,
    ) -> Result<Snapshot, SourceError> {
        let start = Instant::now();
        let result = scheduled.source.poll().await;

        metrics::histogram!("pulse_source_poll_seconds", "kind" => kind.as_str())
            .record(start.elapsed().as_secs_f64());
        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("pulse_source_polls_total", "kind" => kind.as_str(), "outcome" => outcome)
            .increment(1);

        let mut snapshot = result?;
        if snapshot.kind != kind {
            tracing::warn!(
                expected = %kind,
                reported = %snapshot.kind,
                "Metric source reported a different kind, relabelling"
            );
            snapshot.kind = kind;
        }

        Ok(self.store.append(snapshot))
    }

    /// Start one polling loop per registered kind.
    /// Returns a JoinHandle that resolves when every loop has stopped.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        let loops: Vec<JoinHandle<()>> = self
            .sources
            .iter()
            .map(|(kind, scheduled)| {
                let scheduler = Arc::clone(&self);
                let kind = *kind;
                let cadence = scheduled.cadence;
                let cancel_token = cancel_token.clone();
                tokio::spawn(async move { scheduler.run_kind(kind, cadence, cancel_token).await })
            })
            .collect();

        tokio::spawn(async move {
            futures::future::join_all(loops).await;
            tracing::info!("Telemetry scheduler stopped");
        })
    }

    async fn run_kind(&self, kind: MetricKind, cadence: Cadence, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(cadence.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            kind = %kind,
            interval_seconds = cadence.interval.as_secs(),
            gate = ?cadence.gate,
            "Telemetry loop started"
        );

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::debug!(kind = %kind, "Telemetry loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(kind, Utc::now()).await;
                }
            }
        }
    }
}
