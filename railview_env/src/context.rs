//! Core environment context trait for the RailView engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for time and task management.
///
/// The engine never reads a wall clock or spawns tasks directly; it goes
/// through this trait so the same loop runs under tokio in production and
/// under a virtual clock in the simulation harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: `SimContext` - a manually advanced virtual clock
#[async_trait]
pub trait RailViewContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    ///
    /// Tween progress and tick deadlines are measured against this value.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task (used for one in-flight fetch per tick).
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// Production contexts are not seeded and return 0.
    fn seed(&self) -> u64;
}
