//! Data source abstraction for the RailView engine.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{CongestionUpdate, LineOrders, SnapshotBatch, SnapshotQuery, StationRecord};

/// Read-mostly access to the timetable server.
///
/// # Implementations
///
/// - **Production**: `HttpDataSource` (feature `http`)
/// - **Simulation**: `OracleSource` - answers from a deterministic timetable
///
/// # Request Flow
///
/// ```text
/// Engine                     DataSource                  Server
///   |                           |                          |
///   |-- simulation_data(q) ---->|                          |
///   |                           |-- GET simulation_data -->|
///   |                           |<------- records ---------|
///   |<-- SnapshotBatch ---------|                          |
/// ```
///
/// Responses are not guaranteed to resolve in issue order; callers tag
/// requests and discard anything but the latest.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Fetches the static station list (called once at init).
    async fn stations(&self) -> Result<Vec<StationRecord>, EnvError>;

    /// Fetches the ordered station list of every line.
    async fn lines(&self) -> Result<LineOrders, EnvError>;

    /// Fetches the vehicle snapshot for one simulated instant.
    ///
    /// Malformed records are dropped by the source and counted in
    /// `SnapshotBatch::malformed`; only a failure of the whole request is
    /// an `Err`.
    async fn simulation_data(&self, query: &SnapshotQuery) -> Result<SnapshotBatch, EnvError>;

    /// Pushes a congestion change server-side (acknowledgement only).
    async fn update_congestion(&self, update: &CongestionUpdate) -> Result<(), EnvError>;
}

/// Fault injection for data sources in simulation.
pub trait SourceController: Send + Sync {
    /// Adds a fixed delay before every answer.
    fn set_latency_ms(&self, latency_ms: u64);

    /// Sets the probability (0.0 - 1.0) that a snapshot request fails.
    fn set_failure_rate(&self, rate: f64);

    /// Forces the next `count` snapshot requests to fail.
    fn fail_next(&self, count: u32);
}
