//! Marker motion tweening.
//!
//! Each marker has at most one tween. A new target replaces the running
//! tween and starts from wherever the marker is drawn right now, so a late
//! snapshot never makes a marker snap back to the previous target. Tweens
//! are plain data advanced by `frame`; there is no self-rescheduling
//! callback to cancel.

use crate::geometry::{haversine_m, lerp, LatLon};
use crate::vehicle::VehicleKey;
use std::collections::HashMap;
use std::time::Duration;

/// Identifies one tween; superseded tokens stop being current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TweenToken(u64);

/// What `retarget` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// A tween is now in flight.
    Tween(TweenToken),
    /// Move instantly (too far, or tweening disabled).
    Jump,
    /// Already at the target.
    Stationary,
}

/// A position produced by an animation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub key: VehicleKey,
    pub position: LatLon,
    pub finished: bool,
}

#[derive(Debug, Clone)]
struct Tween {
    from: LatLon,
    to: LatLon,
    started: Duration,
    token: TweenToken,
}

impl Tween {
    fn fraction(&self, now: Duration, duration: Duration) -> f64 {
        let elapsed = now.saturating_sub(self.started);
        (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
    }
}

/// Linear tweens keyed by marker.
#[derive(Debug, Clone)]
pub struct MotionAnimator {
    duration: Duration,
    /// Distance above which markers jump instead of sliding (meters).
    jump_threshold_m: Option<f64>,
    tweens: HashMap<VehicleKey, Tween>,
    next_token: u64,
}

impl MotionAnimator {
    pub fn new(duration: Duration, jump_threshold_m: Option<f64>) -> Self {
        Self {
            duration,
            jump_threshold_m,
            tweens: HashMap::new(),
            next_token: 0,
        }
    }

    /// Points `key` at `target`, starting from its rendered position `current`.
    pub fn retarget(&mut self, key: &VehicleKey, current: LatLon, target: LatLon, now: Duration) -> Motion {
        if current == target {
            self.tweens.remove(key);
            return Motion::Stationary;
        }

        let too_far = self
            .jump_threshold_m
            .is_some_and(|limit| haversine_m(current, target) > limit);
        if self.duration.is_zero() || too_far {
            self.tweens.remove(key);
            return Motion::Jump;
        }

        self.next_token += 1;
        let token = TweenToken(self.next_token);
        self.tweens.insert(
            key.clone(),
            Tween {
                from: current,
                to: target,
                started: now,
                token,
            },
        );
        Motion::Tween(token)
    }

    /// Rendered position of an in-flight tween at `now`.
    pub fn position_at(&self, key: &VehicleKey, now: Duration) -> Option<LatLon> {
        self.tweens
            .get(key)
            .map(|tween| lerp(tween.from, tween.to, tween.fraction(now, self.duration)))
    }

    /// Advances every tween to `now`, reading each one's latest target.
    ///
    /// Finished tweens report their exact target and are dropped.
    pub fn frame(&mut self, now: Duration) -> Vec<FrameUpdate> {
        let duration = self.duration;
        let mut updates: Vec<FrameUpdate> = self
            .tweens
            .iter()
            .map(|(key, tween)| {
                let t = tween.fraction(now, duration);
                let finished = t >= 1.0;
                let position = if finished { tween.to } else { lerp(tween.from, tween.to, t) };
                FrameUpdate {
                    key: key.clone(),
                    position,
                    finished,
                }
            })
            .collect();

        for update in updates.iter().filter(|u| u.finished) {
            self.tweens.remove(&update.key);
        }

        updates.sort_by(|a, b| a.key.cmp(&b.key));
        updates
    }

    /// True while `token` is the tween running for `key`.
    pub fn is_current(&self, key: &VehicleKey, token: TweenToken) -> bool {
        self.tweens.get(key).is_some_and(|t| t.token == token)
    }

    pub fn in_flight(&self, key: &VehicleKey) -> bool {
        self.tweens.contains_key(key)
    }

    pub fn cancel(&mut self, key: &VehicleKey) -> bool {
        self.tweens.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    pub fn active_count(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_idle(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
