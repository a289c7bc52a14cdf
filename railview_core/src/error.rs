//! Error types for the RailView engine.

use railview_env::EnvError;
use thiserror::Error;

/// Errors surfaced by the engine and its async driver.
///
/// Per-record problems (unknown stations, bad numbers) are not errors at
/// this level: the record is dropped and counted in `EngineStats`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `start` or a snapshot arrived before `init` loaded the stations
    #[error("Engine not initialized: station index missing")]
    NotInitialized,

    /// Speed multipliers start at 1
    #[error("Invalid speed multiplier: {0}")]
    InvalidSpeed(u32),

    /// A time string that is not `HH:MM:SS`
    #[error("Invalid time string: {0:?}")]
    InvalidTime(String),

    /// The data source failed during init
    #[error("Data source error: {0}")]
    Source(#[from] EnvError),

    /// Rejected configuration value or unreadable config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// The simulation loop is gone (handle outlived it)
    #[error("Simulation loop closed")]
    LoopClosed,
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
