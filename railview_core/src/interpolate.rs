//! Converts snapshot records into map coordinates.

use crate::geometry::{lerp, LatLon};
use crate::stations::StationIndex;
use railview_env::{Placement, VehicleSnapshot};
use thiserror::Error;

/// Why a record could not be placed on the map this tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("unknown station {0:?}")]
    UnknownStation(String),

    #[error("non-finite position data")]
    NonFinite,
}

/// Resolves a record's position against the station index.
pub struct PositionInterpolator<'a> {
    stations: &'a StationIndex,
}

impl<'a> PositionInterpolator<'a> {
    pub fn new(stations: &'a StationIndex) -> Self {
        Self { stations }
    }

    /// Direct coordinates pass through; segments are interpolated between
    /// their stations. `progress` is trusted to be in `[0, 1]` already.
    pub fn resolve(&self, record: &VehicleSnapshot) -> Result<LatLon, InterpolationError> {
        match &record.placement {
            Placement::Direct(position) => {
                if position.is_finite() {
                    Ok(*position)
                } else {
                    Err(InterpolationError::NonFinite)
                }
            }
            Placement::Segment { from, to, progress } => {
                if !progress.is_finite() {
                    return Err(InterpolationError::NonFinite);
                }
                let start = self.lookup(from)?;
                let end = self.lookup(to)?;
                Ok(lerp(start, end, *progress))
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<LatLon, InterpolationError> {
        self.stations
            .get(name)
            .ok_or_else(|| InterpolationError::UnknownStation(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use railview_env::StationRecord;

    fn index() -> StationIndex {
        StationIndex::from_records(&[
            StationRecord::new("A", 37.50, 127.00, "2"),
            StationRecord::new("B", 37.52, 127.02, "2"),
        ])
    }

    #[test]
    fn test_midpoint_between_stations() {
        let stations = index();
        let interpolator = PositionInterpolator::new(&stations);
        let record = VehicleSnapshot::on_segment("K101", "2", "A", "B", 0.5);

        let pos = interpolator.resolve(&record).unwrap();
        assert_relative_eq!(pos.lat, 37.51, epsilon = 1e-9);
        assert_relative_eq!(pos.lon, 127.01, epsilon = 1e-9);
    }

    #[test]
    fn test_boundaries_hit_stations_exactly() {
        let stations = index();
        let interpolator = PositionInterpolator::new(&stations);

        let at_origin = VehicleSnapshot::on_segment("K101", "2", "A", "B", 0.0);
        let at_dest = VehicleSnapshot::on_segment("K101", "2", "A", "B", 1.0);

        assert_eq!(interpolator.resolve(&at_origin).unwrap(), stations.get("A").unwrap());
        assert_eq!(interpolator.resolve(&at_dest).unwrap(), stations.get("B").unwrap());
    }

    #[test]
    fn test_direct_coordinates_pass_through() {
        let stations = index();
        let interpolator = PositionInterpolator::new(&stations);
        let record = VehicleSnapshot::at("K7", "7", LatLon::new(37.7, 127.07));

        assert_eq!(interpolator.resolve(&record).unwrap(), LatLon::new(37.7, 127.07));
    }

    #[test]
    fn test_unknown_station_and_bad_numbers_are_rejected() {
        let stations = index();
        let interpolator = PositionInterpolator::new(&stations);

        let unknown = VehicleSnapshot::on_segment("K101", "2", "A", "Atlantis", 0.3);
        assert_eq!(
            interpolator.resolve(&unknown),
            Err(InterpolationError::UnknownStation("Atlantis".to_string()))
        );

        let nan = VehicleSnapshot::on_segment("K101", "2", "A", "B", f64::NAN);
        assert_eq!(interpolator.resolve(&nan), Err(InterpolationError::NonFinite));
    }
}
