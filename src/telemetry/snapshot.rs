//! Point-in-time telemetry value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MetricKind;

/// Immutable measurement produced by a metric source.
///
/// The payload is opaque to the hub; only `kind` and `captured_at` are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub kind: MetricKind,
    pub payload: Value,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture `payload` now.
    pub fn new(kind: MetricKind, payload: Value) -> Self {
        Self::at(kind, payload, Utc::now())
    }

    pub fn at(kind: MetricKind, payload: Value, captured_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            payload,
            captured_at,
        }
    }
}
