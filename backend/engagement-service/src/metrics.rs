use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

lazy_static! {
    /// Counter cache lookups (hit/miss/degraded).
    pub static ref COUNTER_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "engagement_counter_cache_events_total",
        "Counter cache lookups segmented by outcome",
        &["event"]
    )
    .expect("failed to register engagement_counter_cache_events_total");

    /// Ranking index updates (applied/lost).
    pub static ref RANKING_EVENTS: IntCounterVec = register_int_counter_vec!(
        "engagement_ranking_events_total",
        "Ranking index updates segmented by outcome",
        &["event"]
    )
    .expect("failed to register engagement_ranking_events_total");

    /// Ranking entries whose score diverged from the authoritative counters
    /// and were rewritten by a reconciliation pass.
    pub static ref RANKING_DRIFT_CORRECTED: IntCounter = register_int_counter!(
        "engagement_ranking_drift_corrected_total",
        "Ranking entries rewritten by reconciliation"
    )
    .expect("failed to register engagement_ranking_drift_corrected_total");

    /// Reconciliation passes by result.
    pub static ref RECONCILE_RUNS: IntCounterVec = register_int_counter_vec!(
        "engagement_reconcile_runs_total",
        "Reconciliation passes segmented by result",
        &["result"]
    )
    .expect("failed to register engagement_reconcile_runs_total");

    /// Content nodes removed by cascading deletes.
    pub static ref CASCADE_NODES_DELETED: IntCounter = register_int_counter!(
        "engagement_cascade_nodes_deleted_total",
        "Content nodes removed by cascading deletes"
    )
    .expect("failed to register engagement_cascade_nodes_deleted_total");
}
