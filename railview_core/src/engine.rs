//! Simulation Engine - the orchestration state machine.
//!
//! The engine is sans-IO: it consumes `Command`s and answers with `Effect`s
//! for the driver to carry out (timers, fetches, server pushes). All marker
//! work happens synchronously against the `RenderSurface` passed in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SimulationEngine                        │
//! │                                                              │
//! │   Command ──► ┌──────────────┐   Tick   ┌────────────────┐   │
//! │               │ VirtualClock │ ───────► │ Fetch {seq, q} │ ──┼──► Effect
//! │               └──────────────┘          └────────────────┘   │
//! │                                                              │
//! │   SnapshotReceived {seq} ──► sequence guard ──► Reconciler   │
//! │                                                  │           │
//! │        CongestionOverlay ◄── Region/Pointer      ▼           │
//! │                                          MotionAnimator      │
//! │                                                  │           │
//! └──────────────────────────────────────────────────┼───────────┘
//!                                                    ▼
//!                                              RenderSurface
//! ```
//!
//! # Lifecycle
//!
//! `Idle --Start--> Running --Reset--> Idle`, and `Running --ceiling--> Stopped`.
//! `Stopped` is left only through `Reset`.

use crate::clock::{ClockTick, SimTime, VirtualClock};
use crate::config::{EngineConfig, QueryFilters};
use crate::congestion::{CongestionOverlay, Intensity, PointerEvent, RegionApplied};
use crate::error::EngineError;
use crate::geometry::Bounds;
use crate::motion::MotionAnimator;
use crate::reconcile::MarkerReconciler;
use crate::stations::StationIndex;
use crate::stats::EngineStats;
use crate::surface::RenderSurface;
use railview_env::{CongestionUpdate, EnvError, SnapshotBatch, SnapshotQuery, StationRecord};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Running,
    /// The clock reached the end of the day.
    Stopped,
}

/// Inputs to the engine.
#[derive(Debug)]
pub enum Command {
    Start,
    Tick,
    SnapshotReceived {
        seq: u64,
        result: Result<SnapshotBatch, EnvError>,
    },
    RegionSelected {
        bounds: Bounds,
        intensity: Intensity,
    },
    Pointer(PointerEvent),
    SetIntensityMode(Option<Intensity>),
    SetSpeed(u32),
    SetFilters(QueryFilters),
    Reset,
}

/// Work the driver must perform on the engine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Begin ticking every `tick_interval`. Replaces any earlier timer.
    InstallTimer { generation: u64 },
    CancelTimer { generation: u64 },
    /// Query the data source; answer with `SnapshotReceived { seq }`.
    Fetch { seq: u64, query: SnapshotQuery },
    PushCongestion(CongestionUpdate),
    Halted { at: SimTime },
}

/// Owns every piece of simulation state.
pub struct SimulationEngine {
    config: EngineConfig,
    clock: VirtualClock,
    filters: QueryFilters,
    stations: Option<StationIndex>,
    reconciler: MarkerReconciler,
    animator: MotionAnimator,
    overlay: CongestionOverlay,
    state: LoopState,

    /// Generation of the installed timer, if any
    timer: Option<u64>,
    timer_generations: u64,

    /// Last sequence number handed out. Never rewinds.
    issued_seq: u64,
    /// The only sequence number whose response will be applied
    latest_seq: Option<u64>,

    stats: EngineStats,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut clock = VirtualClock::new(config.start());
        clock.set_speed(config.initial_speed)?;

        Ok(Self {
            clock,
            filters: config.filters.clone(),
            stations: None,
            reconciler: MarkerReconciler::new(),
            animator: MotionAnimator::new(config.tween_duration(), config.jump_threshold_m),
            overlay: CongestionOverlay::new(config.congestion_merge),
            state: LoopState::Idle,
            timer: None,
            timer_generations: 0,
            issued_seq: 0,
            latest_seq: None,
            stats: EngineStats::default(),
            config,
        })
    }

    /// Loads the station index. Must precede `Start`.
    pub fn init(&mut self, records: &[StationRecord]) -> usize {
        let index = StationIndex::from_records(records);
        let count = index.len();
        info!(stations = count, "Station index loaded");
        self.stations = Some(index);
        count
    }

    /// Processes one command at real time `now`.
    pub fn handle<S: RenderSurface + ?Sized>(
        &mut self,
        command: Command,
        now: Duration,
        surface: &mut S,
    ) -> Result<Vec<Effect>, EngineError> {
        let mut effects = Vec::new();

        match command {
            Command::Start => self.start(&mut effects)?,
            Command::Tick => self.tick(&mut effects),
            Command::SnapshotReceived { seq, result } => self.receive(seq, result, now, surface)?,
            Command::RegionSelected { bounds, intensity } => {
                let stations = self.stations.as_ref().ok_or(EngineError::NotInitialized)?;
                let applied = self.overlay.apply(&bounds, intensity, stations);
                self.region_applied(applied, &mut effects);
            }
            Command::Pointer(event) => {
                let stations = self.stations.as_ref().ok_or(EngineError::NotInitialized)?;
                if let Some(applied) = self.overlay.pointer(event, stations) {
                    self.region_applied(applied, &mut effects);
                }
            }
            Command::SetIntensityMode(mode) => self.overlay.set_mode(mode),
            Command::SetSpeed(multiplier) => {
                self.clock.set_speed(multiplier)?;
                info!(speed = multiplier, "Speed changed");
            }
            Command::SetFilters(filters) => self.filters = filters,
            Command::Reset => self.reset(surface, &mut effects),
        }

        Ok(effects)
    }

    fn start(&mut self, effects: &mut Vec<Effect>) -> Result<(), EngineError> {
        if self.stations.is_none() {
            return Err(EngineError::NotInitialized);
        }
        if self.state == LoopState::Stopped {
            debug!("Start ignored: clock halted, reset first");
            return Ok(());
        }

        self.cancel_timer(effects);
        self.timer_generations += 1;
        self.timer = Some(self.timer_generations);
        self.state = LoopState::Running;
        effects.push(Effect::InstallTimer {
            generation: self.timer_generations,
        });

        info!(time = %self.clock.now(), speed = self.clock.speed(), "Simulation started");
        Ok(())
    }

    fn tick(&mut self, effects: &mut Vec<Effect>) {
        if self.state != LoopState::Running {
            debug!(state = ?self.state, "Tick ignored");
            return;
        }

        match self.clock.tick() {
            ClockTick::Halted => {
                self.state = LoopState::Stopped;
                self.cancel_timer(effects);
                let at = self.clock.now();
                info!(%at, "End of service day, simulation stopped");
                effects.push(Effect::Halted { at });
            }
            ClockTick::Advanced(time) => {
                self.stats.ticks += 1;
                self.issued_seq += 1;
                self.latest_seq = Some(self.issued_seq);
                self.stats.queries_issued += 1;
                effects.push(Effect::Fetch {
                    seq: self.issued_seq,
                    query: self.query_at(time),
                });
            }
        }
    }

    fn receive<S: RenderSurface + ?Sized>(
        &mut self,
        seq: u64,
        result: Result<SnapshotBatch, EnvError>,
        now: Duration,
        surface: &mut S,
    ) -> Result<(), EngineError> {
        if self.latest_seq != Some(seq) {
            self.stats.stale_discarded += 1;
            debug!(seq, latest = ?self.latest_seq, "Discarding stale response");
            return Ok(());
        }

        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                self.stats.failed_fetches += 1;
                warn!(seq, %err, "Snapshot fetch failed, keeping previous state");
                return Ok(());
            }
        };

        let stations = self.stations.as_ref().ok_or(EngineError::NotInitialized)?;
        let report = self
            .reconciler
            .reconcile(&batch.records, stations, &mut self.animator, surface, now);

        self.stats.snapshots_applied += 1;
        self.stats.malformed_records += batch.malformed as u64;
        self.stats.records_dropped += report.dropped as u64;
        self.stats.markers_created += report.created as u64;
        self.stats.markers_removed += report.removed as u64;

        debug!(
            seq,
            created = report.created,
            updated = report.updated,
            removed = report.removed,
            dropped = report.dropped,
            "Snapshot applied"
        );
        Ok(())
    }

    fn region_applied(&mut self, applied: RegionApplied, effects: &mut Vec<Effect>) {
        if applied.affected.is_empty() {
            debug!(intensity = %applied.intensity, "Region covers no stations");
            return;
        }

        info!(
            intensity = %applied.intensity,
            stations = applied.affected.len(),
            total = self.overlay.len(),
            "Congestion region applied"
        );
        if self.config.push_congestion {
            effects.push(Effect::PushCongestion(applied.to_update()));
        }
    }

    fn reset<S: RenderSurface + ?Sized>(&mut self, surface: &mut S, effects: &mut Vec<Effect>) {
        self.cancel_timer(effects);
        let removed = self.reconciler.clear(&mut self.animator, surface);
        self.stats.markers_removed += removed as u64;
        self.animator.clear();
        self.overlay.reset();
        self.clock.reset(self.config.start());
        self.latest_seq = None;
        self.state = LoopState::Idle;

        info!(time = %self.clock.now(), removed, "Simulation reset");
    }

    fn cancel_timer(&mut self, effects: &mut Vec<Effect>) {
        if let Some(generation) = self.timer.take() {
            effects.push(Effect::CancelTimer { generation });
        }
    }

    fn query_at(&self, time: SimTime) -> SnapshotQuery {
        SnapshotQuery {
            time: time.to_string(),
            direction: self.filters.direction.clone(),
            weekday: self.filters.weekday.clone(),
            line: self.filters.line.clone(),
            congested: self.overlay.stations(),
            weather: self.overlay.weather(),
        }
    }

    /// Advances in-flight tweens and moves their markers. Returns how many moved.
    pub fn frame<S: RenderSurface + ?Sized>(&mut self, now: Duration, surface: &mut S) -> usize {
        let updates = self.animator.frame(now);
        self.reconciler.apply_frame(&updates, surface);
        updates.len()
    }

    /// Stops the timer and clears every registry: markers, tweens, delay
    /// ledger and congestion. Stats and the clock are kept for reporting.
    pub fn shutdown<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.cancel_timer(&mut effects);
        self.reconciler.clear(&mut self.animator, surface);
        self.animator.clear();
        self.overlay.reset();
        self.latest_seq = None;
        self.state = LoopState::Idle;
        info!("Simulation shut down");
        effects
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn time(&self) -> SimTime {
        self.clock.now()
    }

    pub fn speed(&self) -> u32 {
        self.clock.speed()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn filters(&self) -> &QueryFilters {
        &self.filters
    }

    pub fn stations(&self) -> Option<&StationIndex> {
        self.stations.as_ref()
    }

    pub fn reconciler(&self) -> &MarkerReconciler {
        &self.reconciler
    }

    pub fn overlay(&self) -> &CongestionOverlay {
        &self.overlay
    }

    pub fn timer_generation(&self) -> Option<u64> {
        self.timer
    }

    pub fn latest_seq(&self) -> Option<u64> {
        self.latest_seq
    }

    /// True while any marker is mid-tween.
    pub fn is_animating(&self) -> bool {
        !self.animator.is_idle()
    }
}
