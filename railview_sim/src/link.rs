//! Simulated request/response link with fault injection.
//!
//! Every response is scheduled for delivery at `issued + latency`, where the
//! latency is a base value plus normally distributed jitter. Responses are
//! released in delivery-time order, so jitter larger than the tick interval
//! reorders them. Lost responses are never delivered.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Link characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub base_latency_ms: u64,
    /// Standard deviation of the jitter (ms)
    pub jitter_std_ms: f64,
    /// Probability (0.0 - 1.0) that a response is lost
    pub loss_rate: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_latency_ms: 50,
            jitter_std_ms: 0.0,
            loss_rate: 0.0,
        }
    }
}

impl LinkConfig {
    pub fn with_latency(mut self, base_latency_ms: u64, jitter_std_ms: f64) -> Self {
        self.base_latency_ms = base_latency_ms;
        self.jitter_std_ms = jitter_std_ms;
        self
    }

    pub fn with_loss(mut self, loss_rate: f64) -> Self {
        self.loss_rate = loss_rate.clamp(0.0, 1.0);
        self
    }
}

/// Counters for one link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub sent: u64,
    pub lost: u64,
    pub delivered: u64,
    pub max_latency_ms: u64,
}

/// Delay line for tagged responses.
pub struct SimLink<T> {
    rng: ChaCha8Rng,
    config: LinkConfig,
    jitter: Option<Normal<f64>>,
    /// Keyed by (delivery time, send order)
    pending: BTreeMap<(Duration, u64), (u64, T)>,
    sent_order: u64,
    stats: LinkStats,
}

impl<T> SimLink<T> {
    pub fn new(rng: ChaCha8Rng, config: LinkConfig) -> Self {
        let mut link = Self {
            rng,
            config,
            jitter: None,
            pending: BTreeMap::new(),
            sent_order: 0,
            stats: LinkStats::default(),
        };
        link.configure(config);
        link
    }

    /// Changes latency and loss for responses sent from now on.
    pub fn configure(&mut self, config: LinkConfig) {
        self.config = config;
        self.jitter = if config.jitter_std_ms > 0.0 {
            Normal::new(0.0, config.jitter_std_ms).ok()
        } else {
            None
        };
    }

    /// Schedules `payload` (tagged `seq`) sent at `now`.
    ///
    /// Returns the delivery time, or `None` if the link dropped it.
    pub fn send(&mut self, now: Duration, seq: u64, payload: T) -> Option<Duration> {
        self.stats.sent += 1;

        if self.config.loss_rate > 0.0 && self.rng.gen_bool(self.config.loss_rate) {
            self.stats.lost += 1;
            return None;
        }

        let jitter = self.jitter.map(|normal| normal.sample(&mut self.rng)).unwrap_or(0.0);
        let latency_ms = (self.config.base_latency_ms as f64 + jitter).max(0.0).round() as u64;
        self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency_ms);

        let deliver_at = now + Duration::from_millis(latency_ms);
        self.sent_order += 1;
        self.pending.insert((deliver_at, self.sent_order), (seq, payload));
        Some(deliver_at)
    }

    /// Releases every response due at or before `now`, earliest first.
    pub fn deliver_due(&mut self, now: Duration) -> Vec<(u64, T)> {
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().0 > now {
                break;
            }
            due.push(entry.remove());
        }
        self.stats.delivered += due.len() as u64;
        due
    }

    /// Delivery time of the next pending response.
    pub fn next_delivery(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(at, _)| *at)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn config(&self) -> LinkConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_fixed_latency_keeps_order() {
        let mut link = SimLink::new(rng(1), LinkConfig::default().with_latency(100, 0.0));
        link.send(Duration::from_millis(0), 1, "a");
        link.send(Duration::from_millis(10), 2, "b");

        assert!(link.deliver_due(Duration::from_millis(99)).is_empty());
        assert_eq!(link.deliver_due(Duration::from_millis(110)), vec![(1, "a"), (2, "b")]);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn test_delivery_time_order_reorders() {
        let mut link = SimLink::new(rng(1), LinkConfig::default().with_latency(900, 0.0));
        link.send(Duration::from_millis(0), 1, "slow");

        link.configure(LinkConfig::default().with_latency(50, 0.0));
        link.send(Duration::from_millis(1000), 2, "fast");

        assert_eq!(link.next_delivery(), Some(Duration::from_millis(900)));
        let delivered = link.deliver_due(Duration::from_secs(2));
        assert_eq!(delivered, vec![(1, "slow"), (2, "fast")]);

        link.configure(LinkConfig::default().with_latency(1500, 0.0));
        link.send(Duration::from_millis(2000), 3, "late");
        link.configure(LinkConfig::default().with_latency(50, 0.0));
        link.send(Duration::from_millis(3000), 4, "early");
        let delivered = link.deliver_due(Duration::from_secs(4));
        assert_eq!(delivered, vec![(4, "early"), (3, "late")]);
    }

    #[test]
    fn test_total_loss_delivers_nothing() {
        let mut link = SimLink::new(rng(3), LinkConfig::default().with_loss(1.0));
        for seq in 0..10 {
            assert!(link.send(Duration::ZERO, seq, ()).is_none());
        }
        assert!(link.deliver_due(Duration::from_secs(60)).is_empty());
        assert_eq!(link.stats().lost, 10);
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let config = LinkConfig::default().with_latency(300, 200.0).with_loss(0.1);
        let mut a = SimLink::new(rng(42), config);
        let mut b = SimLink::new(rng(42), config);

        for seq in 0..50 {
            let now = Duration::from_secs(seq);
            assert_eq!(a.send(now, seq, ()), b.send(now, seq, ()));
        }
    }
}
