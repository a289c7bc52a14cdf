//! Simulation Loop - drives `SimulationEngine` with a context and data source.
//!
//! The loop is the only task that touches engine state. It turns engine
//! effects into timers and spawned fetches, and feeds fetch results back as
//! `SnapshotReceived` commands through a channel.
//!
//! # Usage
//!
//! ```ignore
//! use railview_core::{EngineConfig, RecordingSurface, SimulationLoop};
//! use railview_env::{HttpDataSource, TokioContext};
//!
//! let ctx = TokioContext::shared();
//! let source = Arc::new(HttpDataSource::new("http://localhost:10000", timeout)?);
//! let (sim, handle) = SimulationLoop::init(ctx, source, RecordingSurface::new(), EngineConfig::default()).await?;
//!
//! let task = tokio::spawn(sim.run());
//! handle.start()?;
//! ```

use crate::clock::SimTime;
use crate::config::{EngineConfig, QueryFilters};
use crate::congestion::{Intensity, PointerEvent};
use crate::engine::{Command, Effect, LoopState, SimulationEngine};
use crate::error::EngineError;
use crate::geometry::Bounds;
use crate::stats::EngineStats;
use crate::surface::RenderSurface;
use crate::vehicle::VehicleKey;
use railview_env::{DataSource, EnvError, RailViewContext, SnapshotBatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

enum Control {
    Command(Command),
    Shutdown,
}

/// Cloneable remote control for a running `SimulationLoop`.
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl LoopHandle {
    fn send(&self, control: Control) -> Result<(), EngineError> {
        self.tx.send(control).map_err(|_| EngineError::LoopClosed)
    }

    pub fn command(&self, command: Command) -> Result<(), EngineError> {
        self.send(Control::Command(command))
    }

    pub fn start(&self) -> Result<(), EngineError> {
        self.command(Command::Start)
    }

    pub fn reset(&self) -> Result<(), EngineError> {
        self.command(Command::Reset)
    }

    pub fn set_speed(&self, multiplier: u32) -> Result<(), EngineError> {
        self.command(Command::SetSpeed(multiplier))
    }

    pub fn set_filters(&self, filters: QueryFilters) -> Result<(), EngineError> {
        self.command(Command::SetFilters(filters))
    }

    pub fn select_region(&self, bounds: Bounds, intensity: Intensity) -> Result<(), EngineError> {
        self.command(Command::RegionSelected { bounds, intensity })
    }

    pub fn pointer(&self, event: PointerEvent) -> Result<(), EngineError> {
        self.command(Command::Pointer(event))
    }

    pub fn set_intensity_mode(&self, mode: Option<Intensity>) -> Result<(), EngineError> {
        self.command(Command::SetIntensityMode(mode))
    }

    /// Asks the loop to stop; `run` then returns the outcome.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.send(Control::Shutdown)
    }
}

/// What the loop hands back when it exits.
pub struct LoopOutcome<S> {
    pub surface: S,
    pub stats: EngineStats,
    pub state: LoopState,
    pub time: SimTime,
    /// Markers rendered at the moment of shutdown (before clearing).
    pub final_markers: Vec<VehicleKey>,
}

/// The async driver owning the engine and the render surface.
pub struct SimulationLoop<Ctx, Src, S>
where
    Ctx: RailViewContext,
    Src: DataSource,
    S: RenderSurface,
{
    ctx: Arc<Ctx>,
    source: Arc<Src>,
    surface: S,
    engine: SimulationEngine,
    inbox: mpsc::UnboundedReceiver<Control>,
    responses_tx: mpsc::UnboundedSender<(u64, Result<SnapshotBatch, EnvError>)>,
    responses_rx: mpsc::UnboundedReceiver<(u64, Result<SnapshotBatch, EnvError>)>,
    tick_interval: Duration,
    frame_interval: Duration,
    /// Installed timer generation
    timer: Option<u64>,
    /// Context time of the next tick
    next_tick: Option<Duration>,
    /// Context time of the next animation frame
    next_frame: Option<Duration>,
}

impl<Ctx, Src, S> SimulationLoop<Ctx, Src, S>
where
    Ctx: RailViewContext,
    Src: DataSource,
    S: RenderSurface,
{
    /// Builds the engine and loads stations from `source`.
    pub async fn init(
        ctx: Arc<Ctx>,
        source: Arc<Src>,
        surface: S,
        config: EngineConfig,
    ) -> Result<(Self, LoopHandle), EngineError> {
        let tick_interval = config.tick_interval();
        let frame_interval = config.frame_interval();
        let mut engine = SimulationEngine::new(config)?;

        let stations = source.stations().await?;
        engine.init(&stations);

        let (tx, inbox) = mpsc::unbounded_channel();
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();

        let sim = Self {
            ctx,
            source,
            surface,
            engine,
            inbox,
            responses_tx,
            responses_rx,
            tick_interval,
            frame_interval,
            timer: None,
            next_tick: None,
            next_frame: None,
        };
        Ok((sim, LoopHandle { tx }))
    }

    /// Runs until `LoopHandle::shutdown` or until every handle is dropped.
    pub async fn run(mut self) -> LoopOutcome<S> {
        info!(seed = self.ctx.seed(), "Simulation loop running");

        loop {
            let now = self.ctx.now();
            let ticking = self.next_tick.is_some();
            let tick_wait = self.next_tick.map(|at| at.saturating_sub(now)).unwrap_or_default();

            // The frame deadline persists across other events
            if !self.engine.is_animating() {
                self.next_frame = None;
            } else if self.next_frame.is_none() {
                self.next_frame = Some(now + self.frame_interval);
            }
            let animating = self.next_frame.is_some();
            let frame_wait = self.next_frame.map(|at| at.saturating_sub(now)).unwrap_or_default();

            tokio::select! {
                control = self.inbox.recv() => match control {
                    Some(Control::Command(command)) => self.dispatch(command),
                    Some(Control::Shutdown) | None => break,
                },
                Some((seq, result)) = self.responses_rx.recv() => {
                    self.dispatch(Command::SnapshotReceived { seq, result });
                }
                _ = self.ctx.sleep(tick_wait), if ticking => {
                    if let Some(at) = self.next_tick {
                        self.next_tick = Some(at + self.tick_interval);
                    }
                    self.dispatch(Command::Tick);
                }
                _ = self.ctx.sleep(frame_wait), if animating => {
                    let now = self.ctx.now();
                    self.next_frame = Some(now + self.frame_interval);
                    self.engine.frame(now, &mut self.surface);
                }
            }
        }

        let final_markers = self.engine.reconciler().keys();
        let stats = self.engine.stats();
        let state = self.engine.state();
        let time = self.engine.time();
        self.engine.shutdown(&mut self.surface);

        info!(%time, markers = final_markers.len(), "Simulation loop stopped");
        LoopOutcome {
            surface: self.surface,
            stats,
            state,
            time,
            final_markers,
        }
    }

    fn dispatch(&mut self, command: Command) {
        let now = self.ctx.now();
        match self.engine.handle(command, now, &mut self.surface) {
            Ok(effects) => {
                for effect in effects {
                    self.apply(effect, now);
                }
            }
            Err(err) => warn!(%err, "Command rejected"),
        }
    }

    fn apply(&mut self, effect: Effect, now: Duration) {
        match effect {
            Effect::InstallTimer { generation } => {
                self.timer = Some(generation);
                self.next_tick = Some(now + self.tick_interval);
            }
            Effect::CancelTimer { generation } => {
                if self.timer == Some(generation) {
                    self.timer = None;
                    self.next_tick = None;
                }
            }
            Effect::Fetch { seq, query } => {
                let source = Arc::clone(&self.source);
                let tx = self.responses_tx.clone();
                self.ctx.spawn("snapshot-fetch", async move {
                    let result = source.simulation_data(&query).await;
                    // The loop may already be gone
                    let _ = tx.send((seq, result));
                });
            }
            Effect::PushCongestion(update) => {
                let source = Arc::clone(&self.source);
                self.ctx.spawn("congestion-push", async move {
                    if let Err(err) = source.update_congestion(&update).await {
                        warn!(%err, stations = update.stations.len(), "Congestion push failed");
                    }
                });
            }
            Effect::Halted { at } => {
                info!(%at, "Clock halted; waiting for reset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use async_trait::async_trait;
    use railview_env::{
        CongestionUpdate, LineOrders, SnapshotQuery, StationRecord, TokioContext, VehicleSnapshot,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Answers every query with K101 between A and B; one time can be slowed down.
    struct ScriptedSource {
        slow_time: Option<String>,
        pushes: Mutex<Vec<CongestionUpdate>>,
    }

    impl ScriptedSource {
        fn new(slow_time: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                slow_time: slow_time.map(str::to_string),
                pushes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        async fn stations(&self) -> Result<Vec<StationRecord>, EnvError> {
            Ok(vec![
                StationRecord::new("A", 37.50, 127.00, "2"),
                StationRecord::new("B", 37.52, 127.02, "2"),
            ])
        }

        async fn lines(&self) -> Result<LineOrders, EnvError> {
            Ok(LineOrders::new())
        }

        async fn simulation_data(&self, query: &SnapshotQuery) -> Result<SnapshotBatch, EnvError> {
            let delay = if self.slow_time.as_deref() == Some(query.time.as_str()) { 1500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(SnapshotBatch::new(vec![VehicleSnapshot::on_segment("K101", "2", "A", "B", 0.5)]))
        }

        async fn update_congestion(&self, update: &CongestionUpdate) -> Result<(), EnvError> {
            self.pushes.lock().unwrap().push(update.clone());
            Ok(())
        }
    }

    async fn spawn_loop(
        source: Arc<ScriptedSource>,
        config: EngineConfig,
    ) -> (tokio::task::JoinHandle<LoopOutcome<RecordingSurface>>, LoopHandle) {
        let (sim, handle) = SimulationLoop::init(TokioContext::shared(), source, RecordingSurface::new(), config)
            .await
            .unwrap();
        (tokio::spawn(sim.run()), handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_interval() {
        let (task, handle) = spawn_loop(ScriptedSource::new(None), EngineConfig::default()).await;

        handle.start().unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.shutdown().unwrap();
        let outcome = task.await.unwrap();

        assert_eq!(outcome.stats.ticks, 3);
        assert_eq!(outcome.time.to_string(), "09:00:03");
        assert_eq!(outcome.stats.snapshots_applied, 3);
        assert_eq!(outcome.final_markers, vec![VehicleKey::new("K101", "2")]);
        // Shutdown clears the surface
        assert!(outcome.surface.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_discarded() {
        let source = ScriptedSource::new(Some("09:00:01"));
        let (task, handle) = spawn_loop(source, EngineConfig::default()).await;

        handle.start().unwrap();
        tokio::time::sleep(Duration::from_millis(2700)).await;
        handle.shutdown().unwrap();
        let outcome = task.await.unwrap();

        assert_eq!(outcome.stats.ticks, 2);
        assert_eq!(outcome.stats.snapshots_applied, 1);
        assert_eq!(outcome.stats.stale_discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restores_start_and_clears_markers() {
        let (task, handle) = spawn_loop(ScriptedSource::new(None), EngineConfig::default()).await;

        handle.set_speed(30).unwrap();
        handle.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.reset().unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        handle.shutdown().unwrap();
        let outcome = task.await.unwrap();

        assert_eq!(outcome.stats.ticks, 1);
        assert_eq!(outcome.state, LoopState::Idle);
        assert_eq!(outcome.time.to_string(), "09:00:00");
        assert!(outcome.final_markers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_region_is_pushed_when_enabled() {
        let source = ScriptedSource::new(None);
        let config = EngineConfig::default().with_push_congestion(true);
        let (task, handle) = spawn_loop(Arc::clone(&source), config).await;

        let bounds = Bounds::from_corners(
            crate::geometry::LatLon::new(37.0, 126.0),
            crate::geometry::LatLon::new(38.0, 128.0),
        );
        handle.select_region(bounds, Intensity::Severe).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().unwrap();
        task.await.unwrap();

        let pushes = source.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].stations, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(pushes[0].delta, 20);
    }

    /// Moves K101 a tenth of the way along A-B on every query.
    struct SweepingSource {
        queries: AtomicU32,
    }

    #[async_trait]
    impl DataSource for SweepingSource {
        async fn stations(&self) -> Result<Vec<StationRecord>, EnvError> {
            ScriptedSource::new(None).stations().await
        }

        async fn lines(&self) -> Result<LineOrders, EnvError> {
            Ok(LineOrders::new())
        }

        async fn simulation_data(&self, _query: &SnapshotQuery) -> Result<SnapshotBatch, EnvError> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            let progress = f64::from(n % 10) / 10.0;
            Ok(SnapshotBatch::new(vec![VehicleSnapshot::on_segment("K101", "2", "A", "B", progress)]))
        }

        async fn update_congestion(&self, _update: &CongestionUpdate) -> Result<(), EnvError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_run_when_ticks_outpace_them() {
        let source = Arc::new(SweepingSource {
            queries: AtomicU32::new(0),
        });
        let config = EngineConfig::default().with_tick_interval(Duration::from_millis(20));
        let (sim, handle) = SimulationLoop::init(TokioContext::shared(), source, RecordingSurface::new(), config)
            .await
            .unwrap();
        let task = tokio::spawn(sim.run());

        handle.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.shutdown().unwrap();
        let outcome = task.await.unwrap();

        assert!(outcome.stats.ticks >= 45);
        assert!(outcome.surface.ops().moved >= 20, "{:?}", outcome.surface.ops());
    }

    #[tokio::test]
    async fn test_handle_reports_closed_loop() {
        let (sim, handle) =
            SimulationLoop::init(TokioContext::shared(), ScriptedSource::new(None), RecordingSurface::new(), EngineConfig::default())
                .await
                .unwrap();
        drop(sim);
        assert!(matches!(handle.start(), Err(EngineError::LoopClosed)));
    }
}
