//! Health check endpoint handler.

use crate::api::AppState;
use crate::telemetry::MetricKind;
use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub clients: usize,
    /// Kinds with a configured source
    pub sources: Vec<MetricKind>,
    /// Stored snapshot count per kind
    pub snapshots: BTreeMap<MetricKind, usize>,
}

/// GET /health - Return hub status.
///
/// `degraded` when no metric source is configured.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sources = state.scheduler.kinds();
    let status = if sources.is_empty() { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        clients: state.manager.registry().client_count().await,
        sources,
        snapshots: state.store.counts(),
    })
}
