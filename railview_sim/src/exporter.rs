//! JSON exporter for offline replay.
//!
//! Records the rendered markers once per tick so a viewer can replay a run.

use railview_core::{EngineStats, LatLon, RecordingSurface};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    pub tick: u64,

    /// Simulated time as `HH:MM:SS`
    pub time: String,

    pub markers: Vec<MarkerPosition>,

    /// Events (resets, failures, regions, ...)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<SimEvent>,
}

/// One rendered marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerPosition {
    pub id: String,
    pub line: String,
    pub lat: f64,
    pub lon: f64,
    pub color: String,
    pub blinking: bool,
}

impl SimFrame {
    /// Captures every marker currently drawn on `surface`.
    pub fn capture(tick: u64, time: String, surface: &RecordingSurface) -> Self {
        let markers = surface
            .markers()
            .map(|(key, marker)| MarkerPosition {
                id: key.id.clone(),
                line: key.line.clone(),
                lat: marker.position.lat,
                lon: marker.position.lon,
                color: marker.view.style.color.to_string(),
                blinking: marker.view.style.blinking,
            })
            .collect();

        Self {
            tick,
            time,
            markers,
            events: Vec::new(),
        }
    }
}

/// A line drawn through its stations in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePolyline {
    pub line: String,
    pub color: String,
    /// `[lat, lon]` pairs
    pub points: Vec<[f64; 2]>,
}

impl RoutePolyline {
    pub fn new(line: String, points: &[LatLon]) -> Self {
        Self {
            color: railview_core::line_color(&line).to_string(),
            points: points.iter().map(|p| [p.lat, p.lon]).collect(),
            line,
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Static line geometry
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RoutePolyline>,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<EngineStats>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            routes: Vec::new(),
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
            stats: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    /// Attaches an event to the latest frame.
    pub fn add_event(&mut self, event: SimEvent) {
        if let Some(frame) = self.frames.last_mut() {
            frame.events.push(event);
        }
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>, stats: EngineStats) {
        self.passed = passed;
        self.failure_reason = failure_reason;
        self.stats = Some(stats);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railview_core::{LatLon, MarkerView, RenderSurface, VehicleKey};
    use railview_env::VehicleSnapshot;

    #[test]
    fn test_capture_and_serialize() {
        let mut surface = RecordingSurface::new();
        let record = VehicleSnapshot::at("1001", "2", LatLon::new(37.5, 127.0));
        surface.create_marker(
            &VehicleKey::of(&record),
            LatLon::new(37.5, 127.0),
            &MarkerView::for_record(&record, 0.0),
        );

        let mut export = SimExport::new("baseline", 42);
        export.add_frame(SimFrame::capture(1, "09:00:01".into(), &surface));
        export.add_event(SimEvent::warn("fetch failed"));
        export.finalize(true, None, EngineStats::default());

        let json: serde_json::Value = serde_json::to_value(&export).unwrap();
        assert_eq!(json["frames"][0]["markers"][0]["color"], "green");
        assert_eq!(json["frames"][0]["events"][0]["level"], "warn");
        assert!(json.get("failure_reason").is_none());
    }
}
