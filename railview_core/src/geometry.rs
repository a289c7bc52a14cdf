//! Map geometry helpers: great-circle distance, linear interpolation and
//! axis-aligned selection rectangles.

use geo::{coord, point, HaversineDistance, Intersects, Rect};
use serde::{Deserialize, Serialize};

pub use railview_env::LatLon;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_m(a: LatLon, b: LatLon) -> f64 {
    let pa = point! { x: a.lon, y: a.lat };
    let pb = point! { x: b.lon, y: b.lat };
    pa.haversine_distance(&pb)
}

/// Linear interpolation between two coordinates.
///
/// Written as a weighted sum so `t = 0` and `t = 1` reproduce the endpoints
/// bit for bit. `t` is not clamped.
#[inline]
pub fn lerp(from: LatLon, to: LatLon, t: f64) -> LatLon {
    LatLon::new(
        from.lat * (1.0 - t) + to.lat * t,
        from.lon * (1.0 - t) + to.lon * t,
    )
}

/// A rectangle drawn on the map, normalized so either corner order works.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: LatLon,
    pub north_east: LatLon,
}

impl Bounds {
    /// Builds the rectangle spanned by two opposite corners.
    pub fn from_corners(a: LatLon, b: LatLon) -> Self {
        Self {
            south_west: LatLon::new(a.lat.min(b.lat), a.lon.min(b.lon)),
            north_east: LatLon::new(a.lat.max(b.lat), a.lon.max(b.lon)),
        }
    }

    /// Inclusive containment test (points on the edge count as inside).
    pub fn contains(&self, p: LatLon) -> bool {
        self.rect().intersects(&coord! { x: p.lon, y: p.lat })
    }

    fn rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.south_west.lon, y: self.south_west.lat },
            coord! { x: self.north_east.lon, y: self.north_east.lat },
        )
    }
}
