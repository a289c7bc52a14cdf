//! User-drawn congestion regions.
//!
//! While an intensity mode is active, a press/drag/release gesture draws a
//! rectangle. Stations inside it join the congestion set, which is sent
//! with every later query until reset.

use crate::geometry::{Bounds, LatLon};
use crate::stations::StationIndex;
use railview_env::{CongestionUpdate, WeatherLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Strength of a drawn region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Light,
    Moderate,
    Severe,
}

impl Intensity {
    /// Per-station increment under `CongestionMerge::Severity`.
    pub fn increment(&self) -> u32 {
        WeatherLevel::from(*self).delay_seconds()
    }
}

impl From<Intensity> for WeatherLevel {
    fn from(intensity: Intensity) -> Self {
        match intensity {
            Intensity::Light => WeatherLevel::Light,
            Intensity::Moderate => WeatherLevel::Moderate,
            Intensity::Severe => WeatherLevel::Severe,
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(WeatherLevel::from(*self).as_str())
    }
}

impl FromStr for Intensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<WeatherLevel>()? {
            WeatherLevel::Light => Ok(Intensity::Light),
            WeatherLevel::Moderate => Ok(Intensity::Moderate),
            WeatherLevel::Severe => Ok(Intensity::Severe),
            WeatherLevel::None => Err(format!("Not an intensity: {s}")),
        }
    }
}

/// How a new region combines with stations already flagged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionMerge {
    /// Plain set membership.
    #[default]
    Union,
    /// Every region adds its intensity's increment to each covered station.
    Severity,
}

/// Pointer input forwarded from the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(LatLon),
    Move(LatLon),
    Up,
}

/// Press/drag/release state of one rectangle gesture.
#[derive(Debug, Clone, Default)]
pub struct DragTracker {
    anchor: Option<LatLon>,
    corner: Option<LatLon>,
}

impl DragTracker {
    pub fn press(&mut self, at: LatLon) {
        self.anchor = Some(at);
        self.corner = None;
    }

    /// Moves the free corner. Returns the preview rectangle while dragging.
    pub fn drag(&mut self, to: LatLon) -> Option<Bounds> {
        let anchor = self.anchor?;
        self.corner = Some(to);
        Some(Bounds::from_corners(anchor, to))
    }

    /// Ends the gesture. A press without any movement draws nothing.
    pub fn release(&mut self) -> Option<Bounds> {
        let anchor = self.anchor.take()?;
        let corner = self.corner.take()?;
        Some(Bounds::from_corners(anchor, corner))
    }

    pub fn cancel(&mut self) {
        self.anchor = None;
        self.corner = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }
}

/// Outcome of applying one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionApplied {
    /// Stations inside the rectangle, sorted.
    pub affected: Vec<String>,
    pub intensity: Intensity,
}

impl RegionApplied {
    /// Body for the server-side congestion counter.
    pub fn to_update(&self) -> CongestionUpdate {
        CongestionUpdate {
            stations: self.affected.clone(),
            delta: i64::from(self.intensity.increment()),
        }
    }
}

/// The persistent congestion set.
#[derive(Debug, Clone, Default)]
pub struct CongestionOverlay {
    merge: CongestionMerge,
    severity: BTreeMap<String, u32>,
    strongest: Option<Intensity>,
    drag: DragTracker,
    mode: Option<Intensity>,
}

impl CongestionOverlay {
    pub fn new(merge: CongestionMerge) -> Self {
        Self {
            merge,
            ..Default::default()
        }
    }

    /// Selects the drawing intensity. `None` leaves drawing mode and drops
    /// any half-drawn rectangle.
    pub fn set_mode(&mut self, mode: Option<Intensity>) {
        if mode.is_none() {
            self.drag.cancel();
        }
        self.mode = mode;
    }

    pub fn mode(&self) -> Option<Intensity> {
        self.mode
    }

    /// Feeds one pointer event; applies the region when a drag completes.
    pub fn pointer(&mut self, event: PointerEvent, stations: &StationIndex) -> Option<RegionApplied> {
        let intensity = self.mode?;
        match event {
            PointerEvent::Down(at) => {
                self.drag.press(at);
                None
            }
            PointerEvent::Move(to) => {
                self.drag.drag(to);
                None
            }
            PointerEvent::Up => {
                let bounds = self.drag.release()?;
                Some(self.apply(&bounds, intensity, stations))
            }
        }
    }

    /// Flags every station inside `bounds`.
    pub fn apply(&mut self, bounds: &Bounds, intensity: Intensity, stations: &StationIndex) -> RegionApplied {
        let affected = stations.within(bounds);

        if !affected.is_empty() {
            self.strongest = self.strongest.max(Some(intensity));
        }

        for name in &affected {
            match self.merge {
                CongestionMerge::Union => {
                    self.severity.entry(name.clone()).or_insert(intensity.increment());
                }
                CongestionMerge::Severity => {
                    *self.severity.entry(name.clone()).or_insert(0) += intensity.increment();
                }
            }
        }

        RegionApplied { affected, intensity }
    }

    /// Flagged station names, sorted.
    pub fn stations(&self) -> Vec<String> {
        self.severity.keys().cloned().collect()
    }

    pub fn severity_of(&self, station: &str) -> Option<u32> {
        self.severity.get(station).copied()
    }

    /// Strongest intensity applied since the last reset.
    pub fn weather(&self) -> WeatherLevel {
        self.strongest.map(WeatherLevel::from).unwrap_or_default()
    }

    pub fn contains(&self, station: &str) -> bool {
        self.severity.contains_key(station)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn merge(&self) -> CongestionMerge {
        self.merge
    }

    pub fn len(&self) -> usize {
        self.severity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.severity.is_empty()
    }

    /// Clears the set, the weather level and any gesture. The mode is kept.
    pub fn reset(&mut self) {
        self.severity.clear();
        self.strongest = None;
        self.drag.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railview_env::StationRecord;

    fn stations() -> StationIndex {
        StationIndex::from_records(&[
            StationRecord::new("X", 37.50, 127.00, "2"),
            StationRecord::new("Y", 37.51, 127.01, "2"),
            StationRecord::new("Z", 37.60, 127.10, "3"),
        ])
    }

    #[test]
    fn test_drag_adds_each_station_once() {
        let index = stations();
        let mut overlay = CongestionOverlay::new(CongestionMerge::Union);
        overlay.set_mode(Some(Intensity::Severe));

        assert!(overlay.pointer(PointerEvent::Down(LatLon::new(37.49, 126.99)), &index).is_none());
        for step in 0..10 {
            let corner = LatLon::new(37.505 + step as f64 * 0.001, 127.005 + step as f64 * 0.001);
            assert!(overlay.pointer(PointerEvent::Move(corner), &index).is_none());
        }
        assert!(overlay.is_empty());

        let applied = overlay.pointer(PointerEvent::Up, &index).unwrap();
        assert_eq!(applied.affected, vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(overlay.stations(), vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(overlay.weather(), WeatherLevel::Severe);

        // The gesture is consumed
        assert!(overlay.pointer(PointerEvent::Up, &index).is_none());
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn test_no_mode_means_no_drawing() {
        let index = stations();
        let mut overlay = CongestionOverlay::default();

        overlay.pointer(PointerEvent::Down(LatLon::new(37.0, 126.0)), &index);
        overlay.pointer(PointerEvent::Move(LatLon::new(38.0, 128.0)), &index);
        assert!(overlay.pointer(PointerEvent::Up, &index).is_none());
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_click_without_drag_draws_nothing() {
        let index = stations();
        let mut overlay = CongestionOverlay::default();
        overlay.set_mode(Some(Intensity::Light));

        overlay.pointer(PointerEvent::Down(LatLon::new(37.50, 127.00)), &index);
        assert!(overlay.pointer(PointerEvent::Up, &index).is_none());
        assert!(!overlay.is_dragging());
    }

    #[test]
    fn test_boundary_is_inclusive_and_empty_region_is_noop() {
        let index = stations();
        let mut overlay = CongestionOverlay::default();

        let exact = Bounds::from_corners(LatLon::new(37.51, 127.01), LatLon::new(37.60, 127.10));
        let applied = overlay.apply(&exact, Intensity::Light, &index);
        assert_eq!(applied.affected, vec!["Y".to_string(), "Z".to_string()]);

        let mut empty = CongestionOverlay::default();
        let nowhere = Bounds::from_corners(LatLon::new(10.0, 10.0), LatLon::new(11.0, 11.0));
        assert!(empty.apply(&nowhere, Intensity::Severe, &index).affected.is_empty());
        assert!(empty.is_empty());
        assert_eq!(empty.weather(), WeatherLevel::None);
    }

    #[test]
    fn test_severity_merge_accumulates() {
        let index = stations();
        let mut overlay = CongestionOverlay::new(CongestionMerge::Severity);
        let around_x = Bounds::from_corners(LatLon::new(37.49, 126.99), LatLon::new(37.50, 127.00));

        overlay.apply(&around_x, Intensity::Light, &index);
        overlay.apply(&around_x, Intensity::Severe, &index);
        assert_eq!(overlay.severity_of("X"), Some(25));

        let mut union = CongestionOverlay::new(CongestionMerge::Union);
        union.apply(&around_x, Intensity::Light, &index);
        union.apply(&around_x, Intensity::Severe, &index);
        assert_eq!(union.severity_of("X"), Some(5));
        assert_eq!(union.weather(), WeatherLevel::Severe);
    }

    #[test]
    fn test_reset_empties_set_and_keeps_mode() {
        let index = stations();
        let mut overlay = CongestionOverlay::default();
        overlay.set_mode(Some(Intensity::Moderate));
        let all = Bounds::from_corners(LatLon::new(37.0, 126.0), LatLon::new(38.0, 128.0));
        overlay.apply(&all, Intensity::Moderate, &index);
        assert_eq!(overlay.len(), 3);

        overlay.reset();
        assert!(overlay.is_empty());
        assert_eq!(overlay.weather(), WeatherLevel::None);
        assert_eq!(overlay.mode(), Some(Intensity::Moderate));
    }

    #[test]
    fn test_region_to_update_and_parsing() {
        let applied = RegionApplied {
            affected: vec!["X".to_string()],
            intensity: Intensity::Moderate,
        };
        assert_eq!(applied.to_update().delta, 10);
        assert_eq!("강함".parse::<Intensity>().unwrap(), Intensity::Severe);
        assert!("none".parse::<Intensity>().is_err());
        assert_eq!(Intensity::Light.to_string(), "light");
    }
}
