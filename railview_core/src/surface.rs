//! The rendering surface the engine draws on.
//!
//! The real map (Leaflet, a tile renderer, a terminal view) lives outside
//! the engine and implements `RenderSurface`. `RecordingSurface` keeps the
//! markers in memory; the simulation harness and the tests render into it.

use crate::geometry::LatLon;
use crate::vehicle::{MarkerView, VehicleKey};
use std::collections::BTreeMap;

/// Marker operations issued by the engine.
pub trait RenderSurface {
    fn create_marker(&mut self, key: &VehicleKey, position: LatLon, view: &MarkerView);

    fn move_marker(&mut self, key: &VehicleKey, position: LatLon);

    /// Popup text or style changed.
    fn update_marker(&mut self, key: &VehicleKey, view: &MarkerView);

    fn remove_marker(&mut self, key: &VehicleKey);
}

/// A marker as last drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMarker {
    pub position: LatLon,
    pub view: MarkerView,
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceOps {
    pub created: u64,
    pub moved: u64,
    pub updated: u64,
    pub removed: u64,
    /// Operations addressed to a marker that does not exist.
    pub orphaned: u64,
}

/// In-memory surface.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    markers: BTreeMap<VehicleKey, SurfaceMarker>,
    ops: SurfaceOps,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &VehicleKey) -> Option<&SurfaceMarker> {
        self.markers.get(key)
    }

    /// Drawn marker keys in sorted order.
    pub fn keys(&self) -> Vec<VehicleKey> {
        self.markers.keys().cloned().collect()
    }

    pub fn markers(&self) -> impl Iterator<Item = (&VehicleKey, &SurfaceMarker)> {
        self.markers.iter()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn ops(&self) -> SurfaceOps {
        self.ops
    }
}

impl RenderSurface for RecordingSurface {
    fn create_marker(&mut self, key: &VehicleKey, position: LatLon, view: &MarkerView) {
        self.ops.created += 1;
        self.markers.insert(
            key.clone(),
            SurfaceMarker {
                position,
                view: view.clone(),
            },
        );
    }

    fn move_marker(&mut self, key: &VehicleKey, position: LatLon) {
        match self.markers.get_mut(key) {
            Some(marker) => {
                marker.position = position;
                self.ops.moved += 1;
            }
            None => self.ops.orphaned += 1,
        }
    }

    fn update_marker(&mut self, key: &VehicleKey, view: &MarkerView) {
        match self.markers.get_mut(key) {
            Some(marker) => {
                marker.view = view.clone();
                self.ops.updated += 1;
            }
            None => self.ops.orphaned += 1,
        }
    }

    fn remove_marker(&mut self, key: &VehicleKey) {
        match self.markers.remove(key) {
            Some(_) => self.ops.removed += 1,
            None => self.ops.orphaned += 1,
        }
    }
}
