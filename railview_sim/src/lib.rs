//! RailView Deterministic Simulation Testing (DST) Harness
//!
//! Runs the playback engine against a synthetic timetable with every
//! source of non-determinism under control:
//! - **Time**: virtual clock advanced event by event
//! - **Network**: responses delayed, reordered and dropped on a seeded link
//! - **Backend**: a timetable oracle that can be told to fail
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                      │
//! │  ┌──────────────┐  Fetch   ┌──────────────┐              │
//! │  │  Simulation  │─────────►│ OracleSource │              │
//! │  │    Engine    │          │ (timetable)  │              │
//! │  └──────▲───────┘          └──────┬───────┘              │
//! │         │ SnapshotReceived        │ result               │
//! │         │                  ┌──────▼───────┐              │
//! │         └──────────────────│   SimLink    │              │
//! │                            │ latency/loss │              │
//! │  ┌──────────────┐          └──────────────┘              │
//! │  │  Invariant   │◄── RecordingSurface after every apply  │
//! │  │   Checker    │                                        │
//! │  └──────────────┘                                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use railview_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::ResetRace).await;
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod link;
mod oracle;
mod runner;
pub mod scenarios;
mod source;

pub use context::SimContext;
pub use exporter::{MarkerPosition, RoutePolyline, SimEvent, SimExport, SimFrame};
pub use link::{LinkConfig, LinkStats, SimLink};
pub use oracle::{TimetableOracle, TimetableRow};
pub use runner::{InvariantChecker, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use source::OracleSource;
