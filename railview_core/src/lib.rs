//! RailView Core - simulation-state engine for live transit vehicle maps
//!
//! Turns periodic snapshots of scheduled vehicles into a consistent set of
//! animated markers:
//! 1. **Clock**: a virtual time of day advanced by a speed multiplier
//! 2. **Reconciler**: composite-keyed create/update/remove against a render surface
//! 3. **Delay ledger**: edge-triggered accumulation on stopped → moving
//! 4. **Congestion overlay**: user-drawn regions fed back into every query
//!
//! The engine is sans-IO (`SimulationEngine`); `SimulationLoop` drives it
//! through a `RailViewContext` and a `DataSource`.

pub mod clock;
pub mod config;
pub mod congestion;
pub mod delay;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod interpolate;
pub mod motion;
pub mod reconcile;
pub mod runtime;
pub mod stations;
pub mod stats;
pub mod surface;
pub mod vehicle;

// Re-export key types for convenience
pub use clock::{ClockTick, SimTime, VirtualClock, DAY_SECONDS};
pub use config::{EngineConfig, QueryFilters};
pub use congestion::{CongestionMerge, CongestionOverlay, Intensity, PointerEvent, RegionApplied};
pub use delay::DelayAccumulator;
pub use engine::{Command, Effect, LoopState, SimulationEngine};
pub use error::EngineError;
pub use geometry::{haversine_m, Bounds, LatLon};
pub use interpolate::{InterpolationError, PositionInterpolator};
pub use motion::{FrameUpdate, Motion, MotionAnimator, TweenToken};
pub use reconcile::{MarkerReconciler, ReconcileReport};
pub use runtime::{LoopHandle, LoopOutcome, SimulationLoop};
pub use stations::StationIndex;
pub use stats::EngineStats;
pub use surface::{RecordingSurface, RenderSurface, SurfaceMarker, SurfaceOps};
pub use vehicle::{line_color, MarkerStyle, MarkerView, RenderedVehicle, VehicleKey};
