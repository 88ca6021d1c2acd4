//! Observability: field lifecycle and lookup telemetry plus the sink
//! abstraction events flow through.
//!
//! Field and model code never touch `metrics` directly; they emit a
//! `MetricsEvent` and the active sink decides what to do with it.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EntitySummary, EventOps, EventReport, EventState};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
