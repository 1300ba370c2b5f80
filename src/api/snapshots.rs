//! Snapshot history endpoint.

use crate::api::{ApiError, AppState};
use crate::telemetry::{MetricKind, Snapshot};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Trailing window; defaults to the whole retention period
    pub window_seconds: Option<String>,
}

impl HistoryQuery {
    fn window(&self) -> Result<Option<Duration>, ApiError> {
        let Some(raw) = self.window_seconds.as_deref() else {
            return Ok(None);
        };
        let secs: u64 = raw.trim().parse().map_err(|_| {
            ApiError::bad_request(&format!(
                "window_seconds must be a non-negative integer, got '{}'",
                raw
            ))
        })?;
        Ok(Some(Duration::from_secs(secs)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub kind: MetricKind,
    pub channel: &'static str,
    pub window_seconds: u64,
    pub count: usize,
    pub snapshots: Vec<Snapshot>,
}

/// GET /v1/snapshots/:kind - Stored snapshots of one kind, oldest first.
///
/// `kind` may be the kind name (`host_metrics`) or its channel (`metrics`).
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let kind: MetricKind = kind.parse().map_err(|_| {
        let available: Vec<&str> = MetricKind::ALL.iter().map(|k| k.as_str()).collect();
        ApiError::kind_not_found(&kind, &available)
    })?;

    let window = query
        .window()?
        .unwrap_or_else(|| state.store.retention())
        .min(state.store.retention());
    let snapshots = state.store.query(kind, window);

    Ok(Json(HistoryResponse {
        kind,
        channel: kind.channel(),
        window_seconds: window.as_secs(),
        count: snapshots.len(),
        snapshots,
    }))
}
