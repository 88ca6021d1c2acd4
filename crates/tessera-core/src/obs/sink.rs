//! Metrics sink boundary.
//!
//! Field and model logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between field logic
//! and the global metrics state.
use crate::{lookup::LookupKind, obs::metrics};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    FieldDeclared {
        entity_path: &'a str,
    },
    FieldBound {
        entity_path: &'a str,
    },
    CompositeRead {
        entity_path: &'a str,
    },
    CompositeWrite {
        entity_path: &'a str,
        noop: bool,
    },
    LookupTranslated {
        entity_path: &'a str,
        lookup: LookupKind,
    },
    LookupRejected {
        entity_path: &'a str,
    },
    DecodeFailed {
        entity_path: &'a str,
    },
    ArityRejected {
        entity_path: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::FieldDeclared { entity_path } => {
                metrics::with_state_mut(|m| {
                    m.ops.fields_declared = m.ops.fields_declared.saturating_add(1);
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.fields_declared = entry.fields_declared.saturating_add(1);
                });
            }

            MetricsEvent::FieldBound { entity_path } => {
                metrics::with_state_mut(|m| {
                    m.ops.fields_bound = m.ops.fields_bound.saturating_add(1);
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.fields_bound = entry.fields_bound.saturating_add(1);
                });
            }

            MetricsEvent::CompositeRead { entity_path } => {
                metrics::with_state_mut(|m| {
                    m.ops.composite_reads = m.ops.composite_reads.saturating_add(1);
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.composite_reads = entry.composite_reads.saturating_add(1);
                });
            }

            MetricsEvent::CompositeWrite { entity_path, noop } => {
                metrics::with_state_mut(|m| {
                    if noop {
                        m.ops.composite_noop_writes = m.ops.composite_noop_writes.saturating_add(1);
                    } else {
                        m.ops.composite_writes = m.ops.composite_writes.saturating_add(1);
                        let entry = metrics::entity_entry(m, entity_path);
                        entry.composite_writes = entry.composite_writes.saturating_add(1);
                    }
                });
            }

            MetricsEvent::LookupTranslated {
                entity_path,
                lookup,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.lookups_translated = m.ops.lookups_translated.saturating_add(1);
                    match lookup {
                        LookupKind::Exact => {
                            m.ops.lookups_exact = m.ops.lookups_exact.saturating_add(1);
                        }
                        LookupKind::In => m.ops.lookups_in = m.ops.lookups_in.saturating_add(1),
                        _ => {}
                    }
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.lookups_translated = entry.lookups_translated.saturating_add(1);
                });
            }

            MetricsEvent::LookupRejected { entity_path } => {
                metrics::with_state_mut(|m| {
                    m.ops.lookups_rejected = m.ops.lookups_rejected.saturating_add(1);
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.lookups_rejected = entry.lookups_rejected.saturating_add(1);
                });
            }

            MetricsEvent::DecodeFailed { entity_path } => {
                metrics::with_state_mut(|m| {
                    m.ops.decode_failures = m.ops.decode_failures.saturating_add(1);
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.decode_failures = entry.decode_failures.saturating_add(1);
                });
            }

            MetricsEvent::ArityRejected { entity_path } => {
                metrics::with_state_mut(|m| {
                    m.ops.arity_rejections = m.ops.arity_rejections.saturating_add(1);
                    let entry = metrics::entity_entry(m, entity_path);
                    entry.arity_rejections = entry.arity_rejections.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
///
/// `window_start_ms` filters by window start (`EventState::window_start_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    //
    // What would break this:
    // - Any deferred use of `sink_ptr` beyond this scope.
    // - Any path that bypasses Guard restoration.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}
