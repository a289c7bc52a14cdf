//! The marker reconciler.
//!
//! Diffs each accepted snapshot against the markers already on the map:
//! 1. Placement: resolve every record (drop the ones that cannot be placed)
//! 2. Accounting: update the delay ledger for every survivor
//! 3. Create / retarget: new keys get a marker, known keys get a tween
//! 4. Removal: keys missing from the snapshot lose marker, tween and ledger

use crate::delay::DelayAccumulator;
use crate::interpolate::PositionInterpolator;
use crate::motion::{FrameUpdate, Motion, MotionAnimator};
use crate::stations::StationIndex;
use crate::surface::RenderSurface;
use crate::vehicle::{MarkerView, RenderedVehicle, VehicleKey};
use railview_env::VehicleSnapshot;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Records that could not be placed on the map.
    pub dropped: usize,
}

/// Registry of rendered vehicles plus their delay state.
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    vehicles: HashMap<VehicleKey, RenderedVehicle>,
    delays: DelayAccumulator,
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one snapshot batch.
    ///
    /// Afterwards the registry holds exactly the keys of the records that
    /// could be placed. Duplicate keys within a batch collapse to one marker
    /// (the last record wins).
    pub fn reconcile<S: RenderSurface + ?Sized>(
        &mut self,
        records: &[VehicleSnapshot],
        stations: &StationIndex,
        animator: &mut MotionAnimator,
        surface: &mut S,
        now: Duration,
    ) -> ReconcileReport {
        let interpolator = PositionInterpolator::new(stations);
        let mut report = ReconcileReport::default();
        let mut active: HashSet<VehicleKey> = HashSet::with_capacity(records.len());

        for record in records {
            let target = match interpolator.resolve(record) {
                Ok(position) => position,
                Err(err) => {
                    debug!(vehicle = %record.id, line = %record.line, %err, "Dropping vehicle from this tick");
                    report.dropped += 1;
                    continue;
                }
            };

            let key = VehicleKey::of(record);
            let total_delay = self.delays.observe(&key, record.status, record.delay_seconds);
            let view = MarkerView::for_record(record, total_delay);

            match self.vehicles.get_mut(&key) {
                Some(vehicle) => {
                    let current = animator.position_at(&key, now).unwrap_or(vehicle.position);
                    match animator.retarget(&key, current, target, now) {
                        Motion::Tween(_) => {
                            vehicle.position = current;
                            vehicle.animating = true;
                        }
                        Motion::Jump => {
                            vehicle.position = target;
                            vehicle.animating = false;
                            surface.move_marker(&key, target);
                        }
                        Motion::Stationary => {
                            // A tween that ran out between frames was never drawn at its end
                            let drawn_elsewhere = vehicle.animating || vehicle.position != target;
                            vehicle.position = target;
                            vehicle.animating = false;
                            if drawn_elsewhere {
                                surface.move_marker(&key, target);
                            }
                        }
                    }
                    vehicle.target = target;

                    if vehicle.view != view {
                        surface.update_marker(&key, &view);
                        vehicle.view = view;
                    }
                    report.updated += 1;
                }
                None => {
                    surface.create_marker(&key, target, &view);
                    self.vehicles
                        .insert(key.clone(), RenderedVehicle::new(key.clone(), target, view));
                    report.created += 1;
                }
            }

            active.insert(key);
        }

        let mut stale: Vec<VehicleKey> = self
            .vehicles
            .keys()
            .filter(|key| !active.contains(*key))
            .cloned()
            .collect();
        stale.sort();

        for key in stale {
            self.remove(&key, animator, surface);
            report.removed += 1;
        }

        report
    }

    /// Writes animation frame positions to the registry and the surface.
    pub fn apply_frame<S: RenderSurface + ?Sized>(&mut self, updates: &[FrameUpdate], surface: &mut S) {
        for update in updates {
            if let Some(vehicle) = self.vehicles.get_mut(&update.key) {
                vehicle.position = update.position;
                vehicle.animating = !update.finished;
                surface.move_marker(&update.key, update.position);
            }
        }
    }

    /// Removes one vehicle: marker, registry entry, tween and delay state together.
    pub fn remove<S: RenderSurface + ?Sized>(&mut self, key: &VehicleKey, animator: &mut MotionAnimator, surface: &mut S) -> bool {
        if self.vehicles.remove(key).is_none() {
            return false;
        }
        surface.remove_marker(key);
        animator.cancel(key);
        self.delays.forget(key);
        true
    }

    /// Removes every vehicle.
    pub fn clear<S: RenderSurface + ?Sized>(&mut self, animator: &mut MotionAnimator, surface: &mut S) -> usize {
        let keys = self.keys();
        for key in &keys {
            self.remove(key, animator, surface);
        }
        self.delays.clear();
        keys.len()
    }

    pub fn get(&self, key: &VehicleKey) -> Option<&RenderedVehicle> {
        self.vehicles.get(key)
    }

    /// Rendered keys in sorted order.
    pub fn keys(&self) -> Vec<VehicleKey> {
        let mut keys: Vec<VehicleKey> = self.vehicles.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &RenderedVehicle> {
        self.vehicles.values()
    }

    pub fn delays(&self) -> &DelayAccumulator {
        &self.delays
    }

    pub fn delay_total(&self, key: &VehicleKey) -> Option<f64> {
        self.delays.total(key)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
