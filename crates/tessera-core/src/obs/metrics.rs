use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};
use time::OffsetDateTime;

///
/// EventState
/// Ephemeral, in-memory counters for field declaration, access and lookups.
///

#[derive(CandidType, Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            entities: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(CandidType, Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Declaration lifecycle
    pub fields_declared: u64,
    pub fields_bound: u64,

    // Instance access
    pub composite_reads: u64,
    pub composite_writes: u64,
    pub composite_noop_writes: u64,

    // Lookups
    pub lookups_translated: u64,
    pub lookups_exact: u64,
    pub lookups_in: u64,
    pub lookups_rejected: u64,

    // Rejections
    pub decode_failures: u64,
    pub arity_rejections: u64,
}

///
/// EntityCounters
///

#[derive(CandidType, Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntityCounters {
    pub fields_declared: u64,
    pub fields_bound: u64,
    pub composite_reads: u64,
    pub composite_writes: u64,
    pub lookups_translated: u64,
    pub lookups_rejected: u64,
    pub decode_failures: u64,
    pub arity_rejections: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn now_millis() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();

    (nanos / 1_000_000).max(0) as u64
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Borrow (creating on first use) the counters for one entity path.
pub(crate) fn entity_entry<'a>(m: &'a mut EventState, entity_path: &str) -> &'a mut EntityCounters {
    m.entities.entry(entity_path.to_string()).or_default()
}

/// Reset all event state.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

///
/// EventReport
/// Counter report for endpoint/test plumbing.
///

#[derive(CandidType, Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `window_start_ms`.
    pub counters: Option<EventState>,
    /// Per-entity counters with derived ratios.
    pub entity_counters: Vec<EntitySummary>,
}

///
/// EntitySummary
///

#[derive(CandidType, Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntitySummary {
    pub path: String,
    pub fields_declared: u64,
    pub composite_reads: u64,
    pub composite_writes: u64,
    pub lookups_translated: u64,
    pub lookups_rejected: u64,
    pub rejection_rate: f64,
}

/// Build a report from in-memory counters.
///
/// A `window_start_ms` later than the current window yields an empty report.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if window_start_ms.is_some_and(|start| start > snap.window_start_ms) {
        return EventReport::default();
    }

    let mut entity_counters: Vec<EntitySummary> = snap
        .entities
        .iter()
        .map(|(path, ops)| {
            let attempts = ops.lookups_translated.saturating_add(ops.lookups_rejected);
            let rejection_rate = if attempts > 0 {
                ops.lookups_rejected as f64 / attempts as f64
            } else {
                0.0
            };

            EntitySummary {
                path: path.clone(),
                fields_declared: ops.fields_declared,
                composite_reads: ops.composite_reads,
                composite_writes: ops.composite_writes,
                lookups_translated: ops.lookups_translated,
                lookups_rejected: ops.lookups_rejected,
                rejection_rate,
            }
        })
        .collect();

    // busiest entities first, then by path
    entity_counters.sort_by(|a, b| {
        let a_ops = a.composite_reads + a.composite_writes + a.lookups_translated;
        let b_ops = b.composite_reads + b.composite_writes + b.lookups_translated;
        b_ops.cmp(&a_ops).then_with(|| a.path.cmp(&b.path))
    });

    EventReport {
        counters: Some(snap),
        entity_counters,
    }
}
