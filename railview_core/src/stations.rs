//! The static station index.
//!
//! Built once from `GET stations` and never mutated afterwards. Every
//! segment interpolation and every congestion selection resolves station
//! names through it.

use crate::geometry::{Bounds, LatLon};
use railview_env::{LineOrders, StationRecord};
use std::collections::HashMap;
use tracing::debug;

/// A station's coordinate plus the line it was first listed under.
#[derive(Debug, Clone, PartialEq)]
pub struct StationEntry {
    pub position: LatLon,
    pub line_number: String,
}

/// Immutable mapping from station name to coordinate.
#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    entries: HashMap<String, StationEntry>,
}

impl StationIndex {
    /// Builds the index.
    ///
    /// Transfer stations appear once per line in the source data; the first
    /// row wins. Rows with non-finite coordinates are skipped.
    pub fn from_records(records: &[StationRecord]) -> Self {
        let mut entries = HashMap::with_capacity(records.len());

        for record in records {
            let position = record.position();
            if !position.is_finite() {
                debug!(station = %record.name, "Skipping station with non-finite coordinates");
                continue;
            }
            entries.entry(record.name.clone()).or_insert_with(|| StationEntry {
                position,
                line_number: record.line_number.clone(),
            });
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<LatLon> {
        self.entries.get(name).map(|e| e.position)
    }

    pub fn line_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.line_number.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of all stations inside `bounds`, sorted.
    pub fn within(&self, bounds: &Bounds) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| bounds.contains(e.position))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Coordinates of an ordered station list, skipping unknown names.
    pub fn route(&self, stations: &[String]) -> Vec<LatLon> {
        stations.iter().filter_map(|name| self.get(name)).collect()
    }

    /// Drawable polylines for every line with at least two known stations.
    pub fn routes(&self, lines: &LineOrders) -> Vec<(String, Vec<LatLon>)> {
        lines
            .iter()
            .map(|(line, stations)| (line.clone(), self.route(stations)))
            .filter(|(_, coords)| coords.len() >= 2)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StationIndex {
        StationIndex::from_records(&[
            StationRecord::new("A", 37.50, 127.00, "2"),
            StationRecord::new("B", 37.52, 127.02, "2"),
            StationRecord::new("C", 37.60, 127.10, "3"),
            StationRecord::new("B", 37.99, 127.99, "3"),
            StationRecord::new("Broken", f64::NAN, 127.0, "3"),
        ])
    }

    #[test]
    fn test_first_row_wins_for_transfer_stations() {
        let index = sample();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("B"), Some(LatLon::new(37.52, 127.02)));
        assert_eq!(index.line_of("B"), Some("2"));
        assert_eq!(index.get("Broken"), None);
    }

    #[test]
    fn test_within_bounds_sorted() {
        let index = sample();
        let bounds = Bounds::from_corners(LatLon::new(37.49, 126.99), LatLon::new(37.53, 127.03));
        assert_eq!(index.within(&bounds), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_routes_skip_short_lines() {
        let index = sample();
        let mut lines = LineOrders::new();
        lines.insert("2호선".to_string(), vec!["A".into(), "Nowhere".into(), "B".into()]);
        lines.insert("9호선".to_string(), vec!["C".into(), "Nowhere".into()]);

        let routes = index.routes(&lines);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].0, "2호선");
        assert_eq!(routes[0].1.len(), 2);
    }
}
