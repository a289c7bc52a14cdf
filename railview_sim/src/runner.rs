//! Scenario runner - drives the engine against the oracle in virtual time.
//!
//! The runner plays the role `SimulationLoop` plays in production, but
//! event by event: it jumps the `SimContext` clock to the next timer tick,
//! response delivery or animation frame, so a run is a pure function of
//! the seed.

use crate::context::SimContext;
use crate::exporter::{RoutePolyline, SimEvent, SimExport, SimFrame};
use crate::link::{LinkConfig, LinkStats, SimLink};
use crate::oracle::TimetableOracle;
use crate::scenarios::ScenarioId;
use crate::source::OracleSource;

use railview_core::{
    Command, Effect, EngineConfig, EngineStats, Intensity, LatLon, LoopState, PointerEvent, PositionInterpolator,
    RecordingSurface, SimTime, SimulationEngine, VehicleKey, DAY_SECONDS,
};
use railview_env::{DataSource, EnvError, RailViewContext, SnapshotBatch, SnapshotQuery, SourceController};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// RNG stream ids derived from the run seed.
const ORACLE_STREAM: u64 = 1;
const LINK_STREAM: u64 = 2;
const SOURCE_STREAM: u64 = 3;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Timer ticks that advanced the clock
    pub ticks: u64,

    /// Final simulated time
    pub final_time: SimTime,

    /// Markers on the surface at the end
    pub final_markers: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    pub stats: EngineStats,
    pub link: LinkStats,
}

/// Checks run after every accepted snapshot and every issued query.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    /// Delay totals at the previous accepted snapshot
    totals: HashMap<VehicleKey, f64>,
    /// Congestion set at the previous query
    congested: BTreeSet<String>,
    last_applied_seq: Option<u64>,
    /// Highest sequence number issued before the latest reset
    reset_watermark: Option<u64>,
    /// Same train number rendered on two lines at once
    pub collision_seen: bool,
    pub peak_markers: usize,
    pub max_delay_total: f64,
}

impl InvariantChecker {
    /// Verifies an accepted snapshot against what the surface now shows.
    pub fn after_apply(
        &mut self,
        seq: u64,
        expected: &BTreeSet<VehicleKey>,
        engine: &SimulationEngine,
        surface: &RecordingSurface,
    ) -> Result<(), String> {
        if let Some(watermark) = self.reset_watermark {
            if seq <= watermark {
                return Err(format!("response #{seq} issued before reset (<= #{watermark}) was rendered"));
            }
        }
        if let Some(last) = self.last_applied_seq {
            if seq <= last {
                return Err(format!("response #{seq} applied after newer #{last}"));
            }
        }
        self.last_applied_seq = Some(seq);

        let rendered: BTreeSet<VehicleKey> = surface.keys().into_iter().collect();
        if &rendered != expected {
            return Err(format!(
                "rendered {} markers but snapshot #{seq} has {} placeable vehicles",
                rendered.len(),
                expected.len()
            ));
        }

        let registry: BTreeSet<VehicleKey> = engine.reconciler().keys().into_iter().collect();
        if registry != rendered {
            return Err("marker registry and surface disagree".to_string());
        }

        let ledger: BTreeSet<VehicleKey> = engine.reconciler().delays().ledger_keys().cloned().collect();
        if ledger != rendered {
            return Err(format!(
                "delay ledger has {} entries for {} rendered vehicles",
                ledger.len(),
                rendered.len()
            ));
        }

        for vehicle in engine.reconciler().vehicles().filter(|v| !v.animating) {
            let drawn = surface.get(&vehicle.key).map(|m| m.position);
            if drawn != Some(vehicle.position) || vehicle.position != vehicle.target {
                return Err(format!(
                    "{} is at rest but drawn at {:?}, registry {} -> {}",
                    vehicle.key, drawn, vehicle.position, vehicle.target
                ));
            }
        }

        let mut totals = HashMap::with_capacity(rendered.len());
        for key in &rendered {
            let total = engine.reconciler().delay_total(key).unwrap_or(0.0);
            if let Some(previous) = self.totals.get(key) {
                if total < *previous {
                    return Err(format!("delay total of {key} decreased from {previous} to {total}"));
                }
            }
            self.max_delay_total = self.max_delay_total.max(total);
            totals.insert(key.clone(), total);
        }
        self.totals = totals;

        let mut lines_by_id: HashMap<&str, &str> = HashMap::new();
        for key in &rendered {
            if let Some(line) = lines_by_id.insert(key.id.as_str(), key.line.as_str()) {
                if line != key.line {
                    self.collision_seen = true;
                }
            }
        }

        self.peak_markers = self.peak_markers.max(rendered.len());
        Ok(())
    }

    /// Verifies an outgoing query.
    pub fn on_query(&mut self, query: &SnapshotQuery) -> Result<(), String> {
        let time: SimTime = query.time.parse().map_err(|e| format!("bad query time: {e}"))?;
        if time.seconds() >= DAY_SECONDS {
            return Err(format!("query issued past the end of the day: {}", query.time));
        }

        let congested: BTreeSet<String> = query.congested.iter().cloned().collect();
        if !congested.is_superset(&self.congested) {
            return Err("congestion set shrank without a reset".to_string());
        }
        self.congested = congested;
        Ok(())
    }

    /// Forgets per-session state; responses up to `last_issued` are now stale.
    pub fn on_reset(&mut self, last_issued: Option<u64>) {
        self.totals.clear();
        self.congested.clear();
        self.reset_watermark = last_issued.or(self.reset_watermark);
    }
}

/// One engine, one surface, one oracle, one link.
struct Harness {
    ctx: SimContext,
    engine: SimulationEngine,
    surface: RecordingSurface,
    source: OracleSource,
    link: SimLink<Result<SnapshotBatch, EnvError>>,
    checker: InvariantChecker,
    export: Option<SimExport>,
    tick_interval: Duration,
    frame_interval: Duration,
    timer: Option<u64>,
    next_tick_at: Option<Duration>,
    last_issued: Option<u64>,
    halted_at: Option<SimTime>,
    failures_survived: u64,
}

impl Harness {
    async fn new(
        seed: u64,
        config: EngineConfig,
        link: LinkConfig,
        record: Option<&str>,
    ) -> Result<Self, String> {
        let ctx = SimContext::new(seed);
        let oracle = TimetableOracle::demo(seed.wrapping_add(ORACLE_STREAM));
        let source = OracleSource::new(oracle, ctx.derive_rng(SOURCE_STREAM));

        let tick_interval = config.tick_interval();
        let frame_interval = config.frame_interval();
        let mut engine = SimulationEngine::new(config).map_err(|e| e.to_string())?;
        let stations = source.stations().await.map_err(|e| e.to_string())?;
        engine.init(&stations);

        let export = match record {
            Some(name) => {
                let lines = source.lines().await.map_err(|e| e.to_string())?;
                let mut export = SimExport::new(name, seed);
                if let Some(index) = engine.stations() {
                    export.routes = index
                        .routes(&lines)
                        .into_iter()
                        .map(|(line, points)| RoutePolyline::new(line, &points))
                        .collect();
                }
                Some(export)
            }
            None => None,
        };

        Ok(Self {
            link: SimLink::new(ctx.derive_rng(LINK_STREAM), link),
            ctx,
            engine,
            surface: RecordingSurface::new(),
            source,
            checker: InvariantChecker::default(),
            export,
            tick_interval,
            frame_interval,
            timer: None,
            next_tick_at: None,
            last_issued: None,
            halted_at: None,
            failures_survived: 0,
        })
    }

    async fn command(&mut self, command: Command) -> Result<(), String> {
        let now = self.ctx.now();
        let effects = self
            .engine
            .handle(command, now, &mut self.surface)
            .map_err(|e| e.to_string())?;

        for effect in effects {
            match effect {
                Effect::InstallTimer { generation } => {
                    self.timer = Some(generation);
                    self.next_tick_at = Some(now + self.tick_interval);
                }
                Effect::CancelTimer { generation } => {
                    if self.timer == Some(generation) {
                        self.timer = None;
                        self.next_tick_at = None;
                    }
                }
                Effect::Fetch { seq, query } => {
                    self.checker.on_query(&query)?;
                    self.last_issued = Some(seq);
                    let result = self.source.simulation_data(&query).await;
                    if self.link.send(now, seq, result).is_none() {
                        debug!(seq, "Response lost on link");
                    }
                }
                Effect::PushCongestion(update) => {
                    if let Err(err) = self.source.update_congestion(&update).await {
                        warn!(%err, "Congestion push failed");
                    }
                }
                Effect::Halted { at } => {
                    self.halted_at = Some(at);
                    self.event(SimEvent::info(format!("halted at {at}")));
                }
            }
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<(), String> {
        self.command(Command::Start).await
    }

    async fn reset(&mut self) -> Result<(), String> {
        self.command(Command::Reset).await?;
        self.checker.on_reset(self.last_issued);

        if !self.surface.is_empty() {
            return Err(format!("{} markers survived reset", self.surface.len()));
        }
        if !self.engine.overlay().is_empty() {
            return Err("congestion survived reset".to_string());
        }
        if self.engine.time() != self.engine.config().start() {
            return Err(format!("reset restored {} instead of the start time", self.engine.time()));
        }
        self.event(SimEvent::info(format!("reset with {} responses in flight", self.link.in_flight())));
        Ok(())
    }

    /// Hands one delivered response to the engine and checks the outcome.
    async fn deliver(&mut self, seq: u64, result: Result<SnapshotBatch, EnvError>) -> Result<(), String> {
        let current = self.engine.latest_seq() == Some(seq);
        let expected: BTreeSet<VehicleKey> = match (&result, self.engine.stations()) {
            (Ok(batch), Some(stations)) if current => {
                let interpolator = PositionInterpolator::new(stations);
                batch
                    .records
                    .iter()
                    .filter(|record| interpolator.resolve(record).is_ok())
                    .map(VehicleKey::of)
                    .collect()
            }
            _ => BTreeSet::new(),
        };

        let before = self.engine.stats();
        let keys_before = self.surface.keys();
        self.command(Command::SnapshotReceived { seq, result }).await?;
        let after = self.engine.stats();

        if after.snapshots_applied > before.snapshots_applied {
            self.checker
                .after_apply(seq, &expected, &self.engine, &self.surface)?;
        } else if after.failed_fetches > before.failed_fetches {
            if self.surface.keys() != keys_before {
                return Err(format!("failed response #{seq} changed the markers"));
            }
            self.failures_survived += 1;
            self.event(SimEvent::warn(format!("fetch #{seq} failed, markers kept")));
        } else if !self.surface.keys().eq(&keys_before) {
            return Err(format!("stale response #{seq} changed the markers"));
        }
        Ok(())
    }

    async fn on_tick(&mut self) -> Result<(), String> {
        self.command(Command::Tick).await?;
        if let Some(export) = self.export.as_mut() {
            let tick = self.engine.stats().ticks;
            export.add_frame(SimFrame::capture(tick, self.engine.time().to_string(), &self.surface));
        }
        Ok(())
    }

    /// Runs every timer tick, delivery and frame due within `span`.
    async fn advance(&mut self, span: Duration) -> Result<(), String> {
        let target = self.ctx.now() + span;

        loop {
            let now = self.ctx.now();
            let mut next = target;
            if let Some(at) = self.link.next_delivery() {
                next = next.min(at);
            }
            if let Some(at) = self.next_tick_at {
                next = next.min(at);
            }
            if self.engine.is_animating() {
                next = next.min(now + self.frame_interval);
            }

            self.ctx.advance_to(next);

            for (seq, result) in self.link.deliver_due(next) {
                self.deliver(seq, result).await?;
            }

            if let Some(at) = self.next_tick_at {
                if at <= next {
                    self.next_tick_at = Some(at + self.tick_interval);
                    self.on_tick().await?;
                }
            }

            if self.engine.is_animating() {
                self.engine.frame(next, &mut self.surface);
            }

            if next >= target {
                return Ok(());
            }
        }
    }

    async fn run_ticks(&mut self, ticks: u64) -> Result<(), String> {
        let ticks = u32::try_from(ticks).map_err(|_| format!("tick count {ticks} out of range"))?;
        self.advance(self.tick_interval * ticks).await
    }

    /// Lets in-flight responses land without issuing more ticks.
    async fn drain(&mut self) -> Result<(), String> {
        while let Some(at) = self.link.next_delivery() {
            let span = at.saturating_sub(self.ctx.now());
            let timer = self.next_tick_at.take();
            self.advance(span).await?;
            self.next_tick_at = timer.map(|t| t.max(self.ctx.now()));
        }
        Ok(())
    }

    fn event(&mut self, event: SimEvent) {
        if let Some(export) = self.export.as_mut() {
            export.add_event(event);
        }
    }

    /// Delivered responses must each be applied, discarded or counted as failed.
    fn check_accounting(&self) -> Result<(), String> {
        let stats = self.engine.stats();
        let delivered = self.link.stats().delivered;
        let handled = stats.snapshots_applied + stats.stale_discarded + stats.failed_fetches;
        if delivered != handled {
            return Err(format!("{delivered} responses delivered but {handled} handled"));
        }
        Ok(())
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Ticks per scenario (raised to the scenario's minimum)
    ticks: u64,

    /// Base engine configuration
    config: EngineConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ticks: 120,
            config: EngineConfig::default(),
        }
    }

    /// Sets the tick count.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    /// Sets the base engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None).await.0
    }

    /// Runs a scenario and records one frame per tick.
    pub async fn run_recorded(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, Some(scenario.name())).await;
        let mut export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        export.finalize(result.passed, result.failure_reason.clone(), result.stats);
        (result, export)
    }

    async fn execute(&self, scenario: ScenarioId, record: Option<&str>) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        let ticks = self.ticks.max(scenario.min_ticks());

        let (config, link) = self.setup(scenario);
        let mut harness = match Harness::new(self.seed, config, link, record).await {
            Ok(harness) => harness,
            Err(reason) => return (self.failed(scenario, reason), None),
        };

        let outcome = match scenario {
            ScenarioId::Baseline => run_baseline(&mut harness, ticks).await,
            ScenarioId::OutOfOrder => run_out_of_order(&mut harness, ticks).await,
            ScenarioId::FlakyNetwork => run_flaky_network(&mut harness, ticks).await,
            ScenarioId::ResetRace => run_reset_race(&mut harness, ticks).await,
            ScenarioId::LineCollision => run_line_collision(&mut harness, ticks).await,
            ScenarioId::Congestion => run_congestion(&mut harness, ticks).await,
            ScenarioId::DayEnd => run_day_end(&mut harness, ticks).await,
        };
        let outcome = outcome.and_then(|_| harness.check_accounting());

        let stats = harness.engine.stats();
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            ticks: stats.ticks,
            final_time: harness.engine.time(),
            final_markers: harness.surface.len(),
            failure_reason: outcome.err(),
            stats,
            link: harness.link.stats(),
        };

        if result.passed {
            info!(
                "✓ {} complete: {} ticks, {} applied, {} stale, {} failed",
                scenario.name(),
                stats.ticks,
                stats.snapshots_applied,
                stats.stale_discarded,
                stats.failed_fetches
            );
        }
        (result, harness.export.take())
    }

    fn setup(&self, scenario: ScenarioId) -> (EngineConfig, LinkConfig) {
        let base = self.config.clone();
        let link = LinkConfig::default();
        match scenario {
            ScenarioId::Baseline | ScenarioId::LineCollision => (base, link),
            ScenarioId::OutOfOrder => (base, link.with_latency(600, 900.0)),
            ScenarioId::FlakyNetwork => (base, link.with_latency(80, 20.0).with_loss(0.2)),
            ScenarioId::ResetRace => (base, link.with_latency(800, 250.0)),
            ScenarioId::Congestion => (base.with_push_congestion(true), link),
            ScenarioId::DayEnd => (base.with_start(SimTime::hms(23, 58, 0)).with_speed(10), link),
        }
    }

    fn failed(&self, scenario: ScenarioId, reason: String) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            ticks: 0,
            final_time: self.config.start(),
            final_markers: 0,
            failure_reason: Some(reason),
            stats: EngineStats::default(),
            link: LinkStats::default(),
        }
    }
}

/// DST-001: every response lands 50ms after its tick and must be applied.
async fn run_baseline(h: &mut Harness, ticks: u64) -> Result<(), String> {
    h.start().await?;
    h.run_ticks(ticks).await?;
    h.drain().await?;

    let stats = h.engine.stats();
    if stats.stale_discarded > 0 {
        return Err(format!("{} responses discarded on a clean link", stats.stale_discarded));
    }
    if stats.snapshots_applied != stats.ticks {
        return Err(format!("{} of {} responses applied", stats.snapshots_applied, stats.ticks));
    }
    if h.checker.peak_markers == 0 {
        return Err("no vehicles were ever rendered".to_string());
    }
    Ok(())
}

/// DST-002: heavy jitter reorders responses; only the latest may render.
async fn run_out_of_order(h: &mut Harness, ticks: u64) -> Result<(), String> {
    h.start().await?;
    h.run_ticks(ticks).await?;
    h.drain().await?;

    let stats = h.engine.stats();
    debug!(
        stale = stats.stale_discarded,
        max_latency_ms = h.link.stats().max_latency_ms,
        "Out-of-order run finished"
    );
    if stats.snapshots_applied == 0 {
        return Err("no response was ever applied".to_string());
    }
    Ok(())
}

/// DST-003: loss plus failing fetches; a burst of forced failures mid-run.
async fn run_flaky_network(h: &mut Harness, ticks: u64) -> Result<(), String> {
    h.source.set_failure_rate(0.2);
    h.start().await?;
    h.run_ticks(ticks / 2).await?;

    h.source.fail_next(3);
    h.event(SimEvent::warn("forcing 3 fetch failures"));
    h.run_ticks(ticks - ticks / 2).await?;
    h.drain().await?;

    debug!(survived = h.failures_survived, lost = h.link.stats().lost, "Flaky run finished");
    Ok(())
}

/// DST-004: resets land while slow responses are still in flight.
async fn run_reset_race(h: &mut Harness, ticks: u64) -> Result<(), String> {
    let rounds = ticks / 40;
    h.start().await?;

    for _ in 0..rounds {
        h.run_ticks(40).await?;
        h.reset().await?;
        h.start().await?;
    }
    h.run_ticks(ticks - rounds * 40).await?;
    h.drain().await?;

    if h.engine.stats().stale_discarded == 0 && rounds > 0 {
        return Err("no in-flight response was discarded across resets".to_string());
    }
    Ok(())
}

/// DST-005: train numbers shared between lines must stay separate.
async fn run_line_collision(h: &mut Harness, ticks: u64) -> Result<(), String> {
    h.start().await?;
    h.run_ticks(ticks).await?;
    h.drain().await?;

    if !h.checker.collision_seen {
        return Err("never rendered one train number on two lines at once".to_string());
    }
    Ok(())
}

/// DST-006: a severe region drawn with many drag events.
async fn run_congestion(h: &mut Harness, ticks: u64) -> Result<(), String> {
    h.start().await?;
    h.run_ticks(5).await?;

    h.command(Command::SetIntensityMode(Some(Intensity::Severe))).await?;
    h.command(Command::Pointer(PointerEvent::Down(LatLon::new(37.40, 126.90)))).await?;
    for step in 1..=25 {
        let f = step as f64 / 25.0;
        let corner = LatLon::new(37.40 + 0.20 * f, 126.90 + 0.20 * f);
        h.command(Command::Pointer(PointerEvent::Move(corner))).await?;
    }
    h.command(Command::Pointer(PointerEvent::Up)).await?;
    h.command(Command::SetIntensityMode(None)).await?;
    h.event(SimEvent::info("severe region drawn"));

    let flagged = h.engine.overlay().len();
    let stations = h.engine.stations().map(|s| s.len()).unwrap_or(0);
    if flagged != stations {
        return Err(format!("region flagged {flagged} of {stations} stations"));
    }
    let pushes = h.source.pushes();
    if pushes.len() != 1 {
        return Err(format!("expected one congestion push, saw {}", pushes.len()));
    }

    h.run_ticks(ticks - 5).await?;
    h.drain().await?;

    if h.engine.overlay().len() != flagged {
        return Err("congestion set changed without a new region".to_string());
    }
    if h.checker.max_delay_total <= 0.0 {
        return Err("no delay accrued at congested stations".to_string());
    }
    Ok(())
}

/// DST-007: the clock must halt at the day boundary and stay halted.
async fn run_day_end(h: &mut Harness, ticks: u64) -> Result<(), String> {
    h.start().await?;
    h.run_ticks(ticks).await?;
    h.drain().await?;

    if h.engine.state() != LoopState::Stopped {
        return Err(format!("engine still {:?} after the day ended", h.engine.state()));
    }
    let Some(at) = h.halted_at else {
        return Err("no halt was reported".to_string());
    };
    if at.seconds() < DAY_SECONDS {
        return Err(format!("halted early at {at}"));
    }
    if h.next_tick_at.is_some() {
        return Err("timer still installed after halt".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use railview_core::RenderSurface;
    use railview_env::{StationRecord, VehicleSnapshot};

    #[tokio::test]
    async fn test_baseline_passes() {
        let result = ScenarioRunner::new(42).with_ticks(60).run(ScenarioId::Baseline).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.ticks, 60);
        assert_eq!(result.final_time.to_string(), "09:01:00");
    }

    #[tokio::test]
    async fn test_day_end_halts() {
        let result = ScenarioRunner::new(7).run(ScenarioId::DayEnd).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        // 23:58:00 + 11 ticks of 10s = 23:59:50; the 12th tick reaches midnight
        assert_eq!(result.ticks, 11);
        assert_eq!(result.stats.queries_issued, 11);
    }

    #[tokio::test]
    async fn test_same_seed_same_result() {
        let runner = ScenarioRunner::new(1234).with_ticks(80);
        let a = runner.run(ScenarioId::OutOfOrder).await;
        let b = runner.run(ScenarioId::OutOfOrder).await;
        assert_eq!(a.stats, b.stats);
        assert_eq!(a.link, b.link);
    }

    #[tokio::test]
    async fn test_recorded_run_has_frames() {
        let (result, export) = ScenarioRunner::new(3).with_ticks(60).run_recorded(ScenarioId::Baseline).await;
        assert!(result.passed);
        assert_eq!(export.frames.len(), 60);
        assert_eq!(export.routes.len(), 2);
        assert!(export.passed);
    }

    #[test]
    fn test_checker_rejects_shrinking_congestion() {
        let mut checker = InvariantChecker::default();
        let mut query = SnapshotQuery::at("09:00:01");
        query.congested = vec!["A".into(), "B".into()];
        checker.on_query(&query).unwrap();

        query.congested = vec!["A".into()];
        assert!(checker.on_query(&query).is_err());

        checker.on_reset(Some(3));
        assert!(checker.on_query(&query).is_ok());
    }

    #[test]
    fn test_checker_rejects_marker_drawn_off_its_resting_position() {
        let mut engine = SimulationEngine::new(EngineConfig::default()).unwrap();
        engine.init(&[
            StationRecord::new("A", 37.50, 127.00, "2"),
            StationRecord::new("B", 37.52, 127.02, "2"),
        ]);
        let mut surface = RecordingSurface::new();
        engine.handle(Command::Start, Duration::ZERO, &mut surface).unwrap();
        engine.handle(Command::Tick, Duration::ZERO, &mut surface).unwrap();
        let batch = SnapshotBatch::new(vec![VehicleSnapshot::on_segment("K101", "2", "A", "B", 0.5)]);
        engine
            .handle(Command::SnapshotReceived { seq: 1, result: Ok(batch) }, Duration::ZERO, &mut surface)
            .unwrap();

        let key = VehicleKey::new("K101", "2");
        let expected: BTreeSet<VehicleKey> = [key.clone()].into();
        assert!(InvariantChecker::default().after_apply(1, &expected, &engine, &surface).is_ok());

        surface.move_marker(&key, LatLon::new(37.5198, 127.0198));
        assert!(InvariantChecker::default().after_apply(1, &expected, &engine, &surface).is_err());
    }

    #[tokio::test]
    async fn test_oversized_tick_count_is_reported() {
        let mut harness = Harness::new(1, EngineConfig::default(), LinkConfig::default(), None).await.unwrap();
        let err = harness.run_ticks(u64::from(u32::MAX) + 1).await.unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn test_checker_rejects_post_midnight_query() {
        let mut checker = InvariantChecker::default();
        assert!(checker.on_query(&SnapshotQuery::at("24:00:00")).is_err());
    }
}
