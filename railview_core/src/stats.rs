//! Counters collected by the engine.

use serde::Serialize;

/// Running totals since the engine was created. Reset does not clear them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Ticks that advanced the clock
    pub ticks: u64,

    /// Snapshot queries handed to the data source
    pub queries_issued: u64,

    /// Responses that passed the sequence guard and were reconciled
    pub snapshots_applied: u64,

    /// Responses discarded as stale or out of order
    pub stale_discarded: u64,

    /// Current responses that carried an error
    pub failed_fetches: u64,

    /// Records the reconciler could not place
    pub records_dropped: u64,

    /// Records the decoder rejected
    pub malformed_records: u64,

    pub markers_created: u64,
    pub markers_removed: u64,
}
