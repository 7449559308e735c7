//! Simulated clock.
//!
//! One tick always advances one step of the pipeline. Speed multiplies the
//! simulated days covered by that step, never the number of steps.

use serde::{Deserialize, Serialize};

/// Allowed speed multipliers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSpeed {
    #[default]
    X1,
    X2,
    X4,
    X10,
    X100,
}

impl TimeSpeed {
    pub fn multiplier(self) -> f64 {
        match self {
            TimeSpeed::X1 => 1.0,
            TimeSpeed::X2 => 2.0,
            TimeSpeed::X4 => 4.0,
            TimeSpeed::X10 => 10.0,
            TimeSpeed::X100 => 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid time speed {0}, expected one of 1, 2, 4, 10, 100")]
pub struct InvalidTimeSpeed(pub f64);

impl TryFrom<f64> for TimeSpeed {
    type Error = InvalidTimeSpeed;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        match v {
            x if x == 1.0 => Ok(TimeSpeed::X1),
            x if x == 2.0 => Ok(TimeSpeed::X2),
            x if x == 4.0 => Ok(TimeSpeed::X4),
            x if x == 10.0 => Ok(TimeSpeed::X10),
            x if x == 100.0 => Ok(TimeSpeed::X100),
            other => Err(InvalidTimeSpeed(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeManager {
    time_days: f64,
    tick: u64,
    speed: TimeSpeed,
    days_per_tick: f64,
    last_delta_days: f64,
}

impl TimeManager {
    pub fn new(days_per_tick: f64, speed: TimeSpeed) -> Self {
        let days_per_tick = if days_per_tick.is_finite() && days_per_tick > 0.0 {
            days_per_tick
        } else {
            1.0 / 60.0
        };
        Self {
            time_days: 0.0,
            tick: 0,
            speed,
            days_per_tick,
            last_delta_days: 0.0,
        }
    }

    /// Advance one tick and return the simulated days it covers.
    pub fn advance(&mut self) -> f64 {
        let delta = self.days_per_tick * self.speed.multiplier();
        self.time_days += delta;
        self.tick += 1;
        self.last_delta_days = delta;
        delta
    }

    pub fn time_days(&self) -> f64 {
        self.time_days
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn delta_days(&self) -> f64 {
        self.last_delta_days
    }

    pub fn speed(&self) -> TimeSpeed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: TimeSpeed) {
        self.speed = speed;
    }

    pub fn days_per_tick(&self) -> f64 {
        self.days_per_tick
    }
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new(1.0 / 60.0, TimeSpeed::X1)
    }
}
