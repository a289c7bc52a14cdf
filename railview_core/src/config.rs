//! Engine configuration.

use crate::clock::{SimTime, DAY_SECONDS, DEFAULT_START_SECONDS};
use crate::congestion::CongestionMerge;
use crate::error::EngineError;
use railview_env::ALL_FILTER;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Filters forwarded verbatim with every snapshot query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    pub direction: String,
    /// Timetable day type understood by the data source.
    pub weekday: String,
    pub line: String,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            direction: ALL_FILTER.to_string(),
            weekday: "3".to_string(),
            line: ALL_FILTER.to_string(),
        }
    }
}

/// Configuration for `SimulationEngine` and `SimulationLoop`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Clock base in seconds since midnight (restored on reset).
    pub start_seconds: u32,
    pub initial_speed: u32,
    /// Real time between ticks (ms).
    pub tick_interval_ms: u64,
    /// Real time between animation frames (ms).
    pub frame_interval_ms: u64,
    pub tween_duration_ms: u64,
    /// Markers farther than this from their target jump (meters).
    pub jump_threshold_m: Option<f64>,
    pub congestion_merge: CongestionMerge,
    /// Forward each drawn region to the data source.
    pub push_congestion: bool,
    pub filters: QueryFilters,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_seconds: DEFAULT_START_SECONDS,
            initial_speed: 1,
            tick_interval_ms: 1000,
            frame_interval_ms: 33,
            tween_duration_ms: 1000,
            jump_threshold_m: Some(3000.0),
            congestion_merge: CongestionMerge::Union,
            push_congestion: false,
            filters: QueryFilters::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_start(mut self, start: SimTime) -> Self {
        self.start_seconds = start.seconds();
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.initial_speed = speed;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_tween_duration(mut self, duration: Duration) -> Self {
        self.tween_duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_jump_threshold(mut self, meters: Option<f64>) -> Self {
        self.jump_threshold_m = meters;
        self
    }

    pub fn with_merge(mut self, merge: CongestionMerge) -> Self {
        self.congestion_merge = merge;
        self
    }

    pub fn with_push_congestion(mut self, push: bool) -> Self {
        self.push_congestion = push;
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn start(&self) -> SimTime {
        SimTime::from_seconds(self.start_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn tween_duration(&self) -> Duration {
        Duration::from_millis(self.tween_duration_ms)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.start_seconds >= DAY_SECONDS {
            return Err(EngineError::config(format!(
                "start_seconds must be below {DAY_SECONDS}, got {}",
                self.start_seconds
            )));
        }
        if self.initial_speed == 0 {
            return Err(EngineError::InvalidSpeed(0));
        }
        if self.tick_interval_ms == 0 {
            return Err(EngineError::config("tick_interval_ms must be positive"));
        }
        if self.frame_interval_ms == 0 {
            return Err(EngineError::config("frame_interval_ms must be positive"));
        }
        if let Some(limit) = self.jump_threshold_m {
            if !limit.is_finite() || limit < 0.0 {
                return Err(EngineError::config(format!("jump_threshold_m must be a non-negative number, got {limit}")));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}
