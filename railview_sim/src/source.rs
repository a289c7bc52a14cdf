//! DataSource backed by the timetable oracle, with fault injection.

use crate::oracle::TimetableOracle;
use async_trait::async_trait;
use railview_env::{
    CongestionUpdate, DataSource, EnvError, LineOrders, SnapshotBatch, SnapshotQuery, SourceController, StationRecord,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Answers queries from a `TimetableOracle`.
pub struct OracleSource {
    oracle: TimetableOracle,
    rng: Mutex<ChaCha8Rng>,
    latency_ms: AtomicU64,
    /// Failure probability stored as f64 bits
    failure_rate: AtomicU64,
    fail_next: AtomicU32,
    pushes: Mutex<Vec<CongestionUpdate>>,
}

impl OracleSource {
    pub fn new(oracle: TimetableOracle, rng: ChaCha8Rng) -> Self {
        Self {
            oracle,
            rng: Mutex::new(rng),
            latency_ms: AtomicU64::new(0),
            failure_rate: AtomicU64::new(0f64.to_bits()),
            fail_next: AtomicU32::new(0),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn oracle(&self) -> &TimetableOracle {
        &self.oracle
    }

    /// Congestion updates received so far.
    pub fn pushes(&self) -> Vec<CongestionUpdate> {
        self.pushes.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn should_fail(&self) -> bool {
        let forced = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return true;
        }

        let rate = f64::from_bits(self.failure_rate.load(Ordering::SeqCst));
        if rate <= 0.0 {
            return false;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(rate),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl DataSource for OracleSource {
    async fn stations(&self) -> Result<Vec<StationRecord>, EnvError> {
        Ok(self.oracle.stations().to_vec())
    }

    async fn lines(&self) -> Result<LineOrders, EnvError> {
        Ok(self.oracle.lines().clone())
    }

    async fn simulation_data(&self, query: &SnapshotQuery) -> Result<SnapshotBatch, EnvError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.should_fail() {
            return Err(EnvError::network(format!("injected failure at {}", query.time)));
        }

        Ok(SnapshotBatch::new(self.oracle.snapshot(query)))
    }

    async fn update_congestion(&self, update: &CongestionUpdate) -> Result<(), EnvError> {
        let mut pushes = self.pushes.lock().map_err(|_| EnvError::Closed)?;
        pushes.push(update.clone());
        Ok(())
    }
}

impl SourceController for OracleSource {
    fn set_latency_ms(&self, latency_ms: u64) {
        self.latency_ms.store(latency_ms, Ordering::SeqCst);
    }

    fn set_failure_rate(&self, rate: f64) {
        self.failure_rate
            .store(rate.clamp(0.0, 1.0).to_bits(), Ordering::SeqCst);
    }

    fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}
