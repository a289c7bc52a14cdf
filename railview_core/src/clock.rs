//! The virtual clock driving the simulation.
//!
//! Simulated time is an integer count of seconds since midnight. Each tick
//! advances it by the selected speed multiplier; the clock latches once it
//! reaches the end of the service day and never wraps around.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One simulated day. Reaching it halts the clock.
pub const DAY_SECONDS: u32 = 86_400;

/// 09:00:00, the default start of a session.
pub const DEFAULT_START_SECONDS: u32 = 9 * 3600;

/// A simulated time of day in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u32);

impl SimTime {
    pub const fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    pub const fn hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    pub const fn seconds(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.0 / 3600;
        let m = (self.0 % 3600) / 60;
        let s = self.0 % 60;
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}

impl FromStr for SimTime {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidTime(s.to_string());
        let mut parts = s.trim().split(':');
        let mut next = || -> Result<u32, EngineError> {
            parts.next().ok_or_else(invalid)?.parse::<u32>().map_err(|_| invalid())
        };
        let (h, m, sec) = (next()?, next()?, next()?);
        if parts.next().is_some() || m >= 60 || sec >= 60 {
            return Err(invalid());
        }
        Ok(SimTime::hms(h, m, sec))
    }
}

/// Result of advancing the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Time moved forward; query the data source for this instant.
    Advanced(SimTime),
    /// The day is over. Terminal until `reset`.
    Halted,
}

/// Owns simulated time and playback speed.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    seconds: u32,
    speed: u32,
    halted: bool,
}

impl VirtualClock {
    /// Creates a clock at `start` running at 1x.
    pub fn new(start: SimTime) -> Self {
        Self {
            seconds: start.seconds(),
            speed: 1,
            halted: start.seconds() >= DAY_SECONDS,
        }
    }

    /// Advances by the speed multiplier.
    pub fn tick(&mut self) -> ClockTick {
        if self.halted {
            return ClockTick::Halted;
        }

        self.seconds = self.seconds.saturating_add(self.speed);
        if self.seconds >= DAY_SECONDS {
            self.halted = true;
            return ClockTick::Halted;
        }

        ClockTick::Advanced(self.now())
    }

    /// Restores `base` and clears the halted latch. Speed is kept.
    pub fn reset(&mut self, base: SimTime) {
        self.seconds = base.seconds();
        self.halted = self.seconds >= DAY_SECONDS;
    }

    /// Changes the multiplier; applies from the next tick.
    pub fn set_speed(&mut self, multiplier: u32) -> Result<(), EngineError> {
        if multiplier == 0 {
            return Err(EngineError::InvalidSpeed(multiplier));
        }
        self.speed = multiplier;
        Ok(())
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn now(&self) -> SimTime {
        SimTime(self.seconds)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_from_nine() {
        let mut clock = VirtualClock::new(SimTime::from_seconds(DEFAULT_START_SECONDS));
        assert_eq!(clock.now().to_string(), "09:00:00");

        match clock.tick() {
            ClockTick::Advanced(t) => assert_eq!(t.to_string(), "09:00:01"),
            ClockTick::Halted => panic!("clock halted at 09:00"),
        }
    }

    #[test]
    fn test_speed_applies_on_next_tick() {
        let mut clock = VirtualClock::new(SimTime::hms(9, 0, 0));
        clock.tick();
        clock.set_speed(30).unwrap();
        assert_eq!(clock.now(), SimTime::hms(9, 0, 1));

        clock.tick();
        assert_eq!(clock.now(), SimTime::hms(9, 0, 31));
        assert!(matches!(clock.set_speed(0), Err(EngineError::InvalidSpeed(0))));
        assert_eq!(clock.speed(), 30);
    }

    #[test]
    fn test_halts_at_end_of_day_without_wrapping() {
        let mut clock = VirtualClock::new(SimTime::hms(23, 59, 58));
        clock.set_speed(5).unwrap();

        assert_eq!(clock.tick(), ClockTick::Halted);
        assert!(clock.is_halted());
        let frozen = clock.now();
        assert!(frozen.seconds() >= DAY_SECONDS);

        // Further ticks are no-ops
        assert_eq!(clock.tick(), ClockTick::Halted);
        assert_eq!(clock.now(), frozen);
    }

    #[test]
    fn test_reset_clears_halt_and_keeps_speed() {
        let mut clock = VirtualClock::new(SimTime::hms(23, 59, 59));
        clock.set_speed(10).unwrap();
        clock.tick();
        assert!(clock.is_halted());

        clock.reset(SimTime::hms(9, 0, 0));
        assert!(!clock.is_halted());
        assert_eq!(clock.speed(), 10);
        assert_eq!(clock.tick(), ClockTick::Advanced(SimTime::hms(9, 0, 10)));
    }

    #[test]
    fn test_sim_time_format_and_parse() {
        assert_eq!(SimTime::hms(7, 5, 3).to_string(), "07:05:03");
        assert_eq!("7:05:03".parse::<SimTime>().unwrap(), SimTime::hms(7, 5, 3));
        assert_eq!("23:59:59".parse::<SimTime>().unwrap().seconds(), DAY_SECONDS - 1);
        assert!("09:61:00".parse::<SimTime>().is_err());
        assert!("09:00".parse::<SimTime>().is_err());
        assert!("nine".parse::<SimTime>().is_err());
    }
}
