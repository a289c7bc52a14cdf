//! RailView Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the RailView engine run
//! against a live timetable server (tokio + HTTP) or inside the deterministic
//! simulation harness (virtual clock + scripted data source).
//!
//! # Core Concept
//!
//! Everything the engine does not own is reached through a trait:
//! - Time and task spawning (`RailViewContext`)
//! - The timetable data source (`DataSource`)
//!
//! # Example
//!
//! ```ignore
//! use railview_env::{DataSource, RailViewContext, SnapshotQuery};
//!
//! async fn poll<Ctx: RailViewContext, Src: DataSource>(ctx: &Ctx, src: &Src, query: SnapshotQuery) {
//!     loop {
//!         let batch = src.simulation_data(&query).await;
//!         ctx.sleep(std::time::Duration::from_secs(1)).await;
//!     }
//! }
//! ```

mod context;
mod error;
mod source;
mod tokio_impl;
mod types;

#[cfg(feature = "http")]
mod http_impl;

pub use context::RailViewContext;
pub use error::EnvError;
pub use source::{DataSource, SourceController};
pub use tokio_impl::TokioContext;
pub use types::{
    decode_snapshot_batch, CongestionUpdate, LatLon, LineOrders, Placement, SnapshotBatch,
    SnapshotQuery, StationRecord, VehicleSnapshot, VehicleStatus, WeatherLevel, WireVehicle,
    ALL_FILTER,
};

#[cfg(feature = "http")]
pub use http_impl::HttpDataSource;
