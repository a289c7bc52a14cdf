//! Fault scenarios for DST.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// DST-001: clean link, steady playback
    Baseline,

    /// DST-002: jitter well above the tick interval
    OutOfOrder,

    /// DST-003: lost responses and failing fetches
    FlakyNetwork,

    /// DST-004: resets while responses are in flight
    ResetRace,

    /// DST-005: the same train numbers on two lines
    LineCollision,

    /// DST-006: a dragged severe congestion region
    Congestion,

    /// DST-007: playback across the end of the service day
    DayEnd,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::OutOfOrder,
            ScenarioId::FlakyNetwork,
            ScenarioId::ResetRace,
            ScenarioId::LineCollision,
            ScenarioId::Congestion,
            ScenarioId::DayEnd,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::OutOfOrder => "out_of_order",
            ScenarioId::FlakyNetwork => "flaky_network",
            ScenarioId::ResetRace => "reset_race",
            ScenarioId::LineCollision => "line_collision",
            ScenarioId::Congestion => "congestion",
            ScenarioId::DayEnd => "day_end",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "50ms link, no loss; every response is applied in order",
            ScenarioId::OutOfOrder => "600ms +/- 900ms jitter; only the latest response may render",
            ScenarioId::FlakyNetwork => "20% loss + 20% fetch failures; failures keep the previous markers",
            ScenarioId::ResetRace => "reset every 40 ticks with 400-1200ms latency; stale responses never render",
            ScenarioId::LineCollision => "train numbers shared across lines stay separate markers",
            ScenarioId::Congestion => "severe region drawn with many drag events; set grows once, delays accrue",
            ScenarioId::DayEnd => "start at 23:58 at 10x; clock halts at the day boundary",
        }
    }

    /// Fewest ticks needed for the scenario's checks to be meaningful.
    pub fn min_ticks(&self) -> u64 {
        match self {
            ScenarioId::ResetRace => 120,
            ScenarioId::Congestion => 600,
            ScenarioId::DayEnd => 20,
            _ => 60,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "dst-001" => Ok(ScenarioId::Baseline),
            "out_of_order" | "outoforder" | "dst-002" => Ok(ScenarioId::OutOfOrder),
            "flaky_network" | "flakynetwork" | "dst-003" => Ok(ScenarioId::FlakyNetwork),
            "reset_race" | "resetrace" | "dst-004" => Ok(ScenarioId::ResetRace),
            "line_collision" | "linecollision" | "dst-005" => Ok(ScenarioId::LineCollision),
            "congestion" | "dst-006" => Ok(ScenarioId::Congestion),
            "day_end" | "dayend" | "dst-007" => Ok(ScenarioId::DayEnd),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
