//! Edge-triggered delay accounting.
//!
//! A vehicle's reported delay is added to its running total only when it
//! pulls away from a stop (`stopped -> moving`). Holding a status for many
//! ticks adds nothing.

use crate::vehicle::VehicleKey;
use railview_env::VehicleStatus;
use std::collections::HashMap;

/// StatusHistory plus DelayLedger, keyed by composite vehicle key.
#[derive(Debug, Clone, Default)]
pub struct DelayAccumulator {
    /// Last observed status; `None` inside means "observed without status".
    history: HashMap<VehicleKey, Option<VehicleStatus>>,
    ledger: HashMap<VehicleKey, f64>,
}

impl DelayAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one observation and returns the cumulative delay.
    pub fn observe(&mut self, key: &VehicleKey, status: Option<VehicleStatus>, delay_seconds: Option<f64>) -> f64 {
        let previous = self.history.insert(key.clone(), status).flatten();
        let total = self.ledger.entry(key.clone()).or_insert(0.0);

        if status == Some(VehicleStatus::Moving) && previous == Some(VehicleStatus::Stopped) {
            *total += delay_seconds.unwrap_or(0.0);
        }

        *total
    }

    /// Drops both ledger and history entries for a removed vehicle.
    pub fn forget(&mut self, key: &VehicleKey) {
        self.history.remove(key);
        self.ledger.remove(key);
    }

    pub fn total(&self, key: &VehicleKey) -> Option<f64> {
        self.ledger.get(key).copied()
    }

    pub fn last_status(&self, key: &VehicleKey) -> Option<VehicleStatus> {
        self.history.get(key).copied().flatten()
    }

    pub fn has_history(&self, key: &VehicleKey) -> bool {
        self.history.contains_key(key)
    }

    pub fn ledger_keys(&self) -> impl Iterator<Item = &VehicleKey> {
        self.ledger.keys()
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.ledger.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VehicleStatus::{Moving, Stopped, Terminal};

    fn key() -> VehicleKey {
        VehicleKey::new("K101", "2")
    }

    #[test]
    fn test_first_observation_never_accumulates() {
        let mut acc = DelayAccumulator::new();
        assert_eq!(acc.observe(&key(), Some(Moving), Some(30.0)), 0.0);
        assert_eq!(acc.total(&key()), Some(0.0));
    }

    #[test]
    fn test_only_stopped_to_moving_edge_counts() {
        let mut acc = DelayAccumulator::new();
        let k = key();

        acc.observe(&k, Some(Stopped), Some(20.0));
        assert_eq!(acc.observe(&k, Some(Stopped), Some(20.0)), 0.0);
        assert_eq!(acc.observe(&k, Some(Moving), Some(20.0)), 20.0);

        // Level-held moving adds nothing
        assert_eq!(acc.observe(&k, Some(Moving), Some(20.0)), 20.0);
        assert_eq!(acc.observe(&k, Some(Moving), Some(20.0)), 20.0);

        // Second stop, second departure
        acc.observe(&k, Some(Stopped), Some(5.0));
        assert_eq!(acc.observe(&k, Some(Moving), Some(5.0)), 25.0);
    }

    #[test]
    fn test_missing_status_breaks_the_edge() {
        let mut acc = DelayAccumulator::new();
        let k = key();

        acc.observe(&k, Some(Stopped), Some(10.0));
        acc.observe(&k, None, Some(10.0));
        assert!(acc.has_history(&k));
        assert_eq!(acc.last_status(&k), None);
        assert_eq!(acc.observe(&k, Some(Moving), Some(10.0)), 0.0);

        acc.observe(&k, Some(Terminal), Some(10.0));
        assert_eq!(acc.observe(&k, Some(Moving), Some(10.0)), 0.0);
    }

    #[test]
    fn test_forget_removes_both_entries() {
        let mut acc = DelayAccumulator::new();
        let k = key();
        acc.observe(&k, Some(Stopped), None);

        acc.forget(&k);
        assert!(!acc.has_history(&k));
        assert_eq!(acc.total(&k), None);
        assert!(acc.is_empty());

        // A returning vehicle starts fresh
        assert_eq!(acc.observe(&k, Some(Moving), Some(50.0)), 0.0);
    }
}
