//! # HTTP Surface
//!
//! ## Endpoints
//!
//! - `GET /ws` - WebSocket telemetry stream
//! - `GET /health` - Hub status with client and snapshot counts
//! - `GET /v1/snapshots/:kind?window_seconds=N` - Snapshot history for one kind
//! - `GET /metrics` - Prometheus exposition
//!
//! ## Example
//!
//! ```no_run
//! use pulse::api::{create_router, AppState};
//! use pulse::config::PulseConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = Arc::new(AppState::new(Arc::new(PulseConfig::default())));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8600").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod health;
mod snapshots;

pub use error::{ApiError, ApiErrorBody};
pub use health::HealthResponse;
pub use snapshots::HistoryResponse;

use crate::config::PulseConfig;
use crate::hub::{BroadcastRegistry, ConnectionManager, StaticTokenVerifier};
use crate::metrics::MetricsCollector;
use crate::telemetry::{SnapshotStore, TelemetryScheduler};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<PulseConfig>,
    pub manager: Arc<ConnectionManager>,
    pub store: Arc<SnapshotStore>,
    pub scheduler: Arc<TelemetryScheduler>,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    /// Build the hub from configuration: registry, store, scheduler and manager.
    pub fn new(config: Arc<PulseConfig>) -> Self {
        let registry = Arc::new(BroadcastRegistry::new());
        let store = Arc::new(SnapshotStore::from_config(&config.telemetry));
        let scheduler = Arc::new(TelemetryScheduler::from_config(
            &config.telemetry,
            Arc::clone(&store),
            Arc::clone(&registry),
        ));
        Self::from_parts(config, registry, store, scheduler)
    }

    /// Assemble state around an existing scheduler.
    ///
    /// The scheduler must share `registry` and `store`.
    pub fn from_parts(
        config: Arc<PulseConfig>,
        registry: Arc<BroadcastRegistry>,
        store: Arc<SnapshotStore>,
        scheduler: Arc<TelemetryScheduler>,
    ) -> Self {
        let mut manager =
            ConnectionManager::new(Arc::clone(&registry), Arc::clone(&store), &config.liveness)
                .with_scheduler(Arc::clone(&scheduler))
                .with_outbound_buffer(config.server.outbound_buffer);
        if let Some(token) = &config.server.auth_token {
            manager = manager.with_auth_verifier(Arc::new(StaticTokenVerifier::new(token.clone())));
        }

        let start_time = Instant::now();
        let metrics_collector = Arc::new(MetricsCollector::new(
            registry,
            Arc::clone(&store),
            start_time,
            crate::metrics::prometheus_handle(),
        ));

        Self {
            config,
            manager: Arc::new(manager),
            store,
            scheduler,
            start_time,
            metrics_collector,
        }
    }
}

/// Create the router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(crate::hub::websocket::websocket_handler))
        .route("/health", get(health::handle))
        .route("/v1/snapshots/:kind", get(snapshots::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
