//! Rendered vehicle state: composite keys, marker styling and popup text.

use crate::geometry::LatLon;
use railview_env::{VehicleSnapshot, VehicleStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a tracked vehicle.
///
/// Train numbers are reused across lines, so the line is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleKey {
    pub id: String,
    pub line: String,
}

impl VehicleKey {
    pub fn new(id: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            line: line.into(),
        }
    }

    pub fn of(record: &VehicleSnapshot) -> Self {
        Self::new(record.id.clone(), record.line.clone())
    }
}

impl fmt::Display for VehicleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.line)
    }
}

/// Leading line number, tolerating labels such as `"02"` or `"2호선"`.
fn line_number(line: &str) -> Option<u32> {
    let digits: String = line.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Map color of a line.
pub fn line_color(line: &str) -> &'static str {
    match line_number(line) {
        Some(1) => "blue",
        Some(2) => "green",
        Some(3) => "orange",
        Some(4) => "skyblue",
        Some(5) => "purple",
        Some(6) => "brown",
        Some(7) => "olive",
        Some(8) => "pink",
        _ => "gray",
    }
}

/// Human label of a line (`"2"` -> `"Line 2"`); non-numeric names pass through.
pub fn line_label(line: &str) -> String {
    match line_number(line) {
        Some(n) => format!("Line {n}"),
        None => line.to_string(),
    }
}

fn format_delay(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as u64;
    if total < 60 {
        format!("{total}s")
    } else {
        format!("{}m {:02}s", total / 60, total % 60)
    }
}

/// Visual style of a vehicle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub color: &'static str,
    /// Stopped vehicles blink.
    pub blinking: bool,
}

impl MarkerStyle {
    pub fn for_vehicle(line: &str, status: Option<VehicleStatus>) -> Self {
        Self {
            color: line_color(line),
            blinking: status == Some(VehicleStatus::Stopped),
        }
    }
}

/// Everything the surface needs to draw a marker besides its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerView {
    pub popup: String,
    pub style: MarkerStyle,
}

impl MarkerView {
    /// Popup lists line, train number, destination and cumulative delay.
    pub fn for_record(record: &VehicleSnapshot, total_delay: f64) -> Self {
        let popup = format!(
            "{} · {}\n→ {}\nDelay {}",
            line_label(&record.line),
            record.id,
            record.destination,
            format_delay(total_delay),
        );
        Self {
            popup,
            style: MarkerStyle::for_vehicle(&record.line, record.status),
        }
    }
}

/// Engine-owned state of one marker on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVehicle {
    pub key: VehicleKey,
    /// Where the marker currently is on screen (mid-tween if animating).
    pub position: LatLon,
    /// Where the latest snapshot put it.
    pub target: LatLon,
    pub view: MarkerView,
    pub animating: bool,
}

impl RenderedVehicle {
    pub fn new(key: VehicleKey, position: LatLon, view: MarkerView) -> Self {
        Self {
            key,
            position,
            target: position,
            view,
            animating: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_line() {
        let a = VehicleKey::new("1001", "1");
        let b = VehicleKey::new("1001", "2");
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "1001@1");
    }

    #[test]
    fn test_line_palette() {
        assert_eq!(line_color("2"), "green");
        assert_eq!(line_color("02"), "green");
        assert_eq!(line_color("4호선"), "skyblue");
        assert_eq!(line_color("Airport"), "gray");
        assert_eq!(line_label("7"), "Line 7");
        assert_eq!(line_label("Airport"), "Airport");
    }

    #[test]
    fn test_popup_and_blinking() {
        let record = VehicleSnapshot::on_segment("K101", "2", "A", "B", 0.5)
            .with_status(VehicleStatus::Stopped);
        let view = MarkerView::for_record(&record, 75.0);

        assert_eq!(view.popup, "Line 2 · K101\n→ B\nDelay 1m 15s");
        assert!(view.style.blinking);
        assert_eq!(view.style.color, "green");
    }
}
