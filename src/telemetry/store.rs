//! Recent snapshot history, one ring per metric kind.
//!
//! Each ring is kept in capture order, so retention eviction only ever pops
//! from the front and window queries binary-search for their start.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use super::{MetricKind, Snapshot};
use crate::config::TelemetryConfig;

/// Bounded recent-history buffer keyed by metric kind.
pub struct SnapshotStore {
    series: DashMap<MetricKind, VecDeque<Snapshot>>,
    retention: chrono::Duration,
    max_snapshots: usize,
}

impl SnapshotStore {
    /// Creates a store keeping at most `retention` worth and `max_snapshots`
    /// entries per kind.
    pub fn new(retention: Duration, max_snapshots: usize) -> Self {
        Self {
            series: DashMap::new(),
            retention: to_chrono(retention),
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(
            Duration::from_secs(config.retention_seconds),
            config.max_snapshots,
        )
    }

    /// Retention window applied on append.
    pub fn retention(&self) -> Duration {
        self.retention.to_std().unwrap_or_default()
    }

    /// Appends a snapshot and evicts anything outside retention or capacity.
    ///
    /// A snapshot captured before the newest stored one is stamped with the
    /// newest capture time so the ring stays ordered. Returns the stored value.
    pub fn append(&self, mut snapshot: Snapshot) -> Snapshot {
        let mut ring = self.series.entry(snapshot.kind).or_default();

        if let Some(newest) = ring.back() {
            if snapshot.captured_at < newest.captured_at {
                tracing::debug!(
                    kind = %snapshot.kind,
                    captured_at = %snapshot.captured_at,
                    newest = %newest.captured_at,
                    "Snapshot captured out of order, clamping timestamp"
                );
                snapshot.captured_at = newest.captured_at;
            }
        }

        // A retention reaching past the representable range keeps everything.
        if let Some(cutoff) = snapshot.captured_at.checked_sub_signed(self.retention) {
            while ring.front().is_some_and(|oldest| oldest.captured_at < cutoff) {
                ring.pop_front();
            }
        }

        ring.push_back(snapshot.clone());
        while ring.len() > self.max_snapshots {
            ring.pop_front();
        }

        snapshot
    }

    /// Snapshots of `kind` captured within the trailing `window`, oldest first.
    pub fn query(&self, kind: MetricKind, window: Duration) -> Vec<Snapshot> {
        self.query_at(kind, window, Utc::now())
    }

    /// Same as [`query`](Self::query) with an explicit reference time.
    ///
    /// The window is capped at the retention period.
    pub fn query_at(&self, kind: MetricKind, window: Duration, now: DateTime<Utc>) -> Vec<Snapshot> {
        let Some(ring) = self.series.get(&kind) else {
            return Vec::new();
        };

        let window = to_chrono(window).min(self.retention);
        let start = match now.checked_sub_signed(window) {
            Some(cutoff) => ring.partition_point(|s| s.captured_at < cutoff),
            None => 0,
        };
        ring.range(start..).cloned().collect()
    }

    /// Newest snapshot of `kind`, if any.
    pub fn latest(&self, kind: MetricKind) -> Option<Snapshot> {
        self.series.get(&kind).and_then(|ring| ring.back().cloned())
    }

    /// Number of stored snapshots of `kind`.
    pub fn len(&self, kind: MetricKind) -> usize {
        self.series.get(&kind).map_or(0, |ring| ring.len())
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|ring| ring.is_empty())
    }

    /// Stored snapshot count per kind.
    pub fn counts(&self) -> BTreeMap<MetricKind, usize> {
        self.series
            .iter()
            .map(|ring| (*ring.key(), ring.len()))
            .collect()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
