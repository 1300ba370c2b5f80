//! Telemetry collection: metric kinds, sources, cadences, history and the
//! polling scheduler.

mod cadence;
mod kind;
pub mod scheduler;
mod snapshot;
pub mod source;
mod store;

pub use cadence::{Cadence, CadenceGate};
pub use kind::MetricKind;
pub use scheduler::{TelemetryScheduler, TickOutcome};
pub use snapshot::Snapshot;
pub use source::{build_source, CommandSource, HttpSource, MetricSource, SourceError};
pub use store::SnapshotStore;
