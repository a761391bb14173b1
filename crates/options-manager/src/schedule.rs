//! Wall-clock gates: end-of-day square-off and the adjustment cutoff.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};
use parking_lot::Mutex;

use straddle_core::{ConfigError, EngineConfig};

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to. Used for replays and tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Square-off time and adjustment cutoff hour for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareOffSchedule {
    pub square_off: NaiveTime,
    pub adjustment_cutoff_hour: u32,
}

impl SquareOffSchedule {
    /// Builds the schedule from engine settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSquareOff`] / [`ConfigError::InvalidCutoffHour`]
    /// for out-of-range values.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let square_off = config
            .square_off_time()
            .ok_or(ConfigError::InvalidSquareOff {
                hour: config.square_off_hour,
                minute: config.square_off_minute,
            })?;
        if config.adjustment_cutoff_hour >= 24 {
            return Err(ConfigError::InvalidCutoffHour(config.adjustment_cutoff_hour));
        }
        Ok(Self {
            square_off,
            adjustment_cutoff_hour: config.adjustment_cutoff_hour,
        })
    }

    /// True once the time of day reaches the square-off time.
    #[must_use]
    pub fn is_square_off(&self, now: NaiveDateTime) -> bool {
        now.time() >= self.square_off
    }

    /// True while the hour is before the adjustment cutoff.
    #[must_use]
    pub fn adjustments_allowed(&self, now: NaiveDateTime) -> bool {
        now.hour() < self.adjustment_cutoff_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 28)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn schedule() -> SquareOffSchedule {
        SquareOffSchedule::from_config(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn square_off_fires_at_and_after_configured_time() {
        let schedule = schedule();
        assert!(!schedule.is_square_off(at(15, 28, 59)));
        assert!(schedule.is_square_off(at(15, 29, 0)));
        assert!(schedule.is_square_off(at(15, 45, 0)));
        // later hours stay squared off
        assert!(schedule.is_square_off(at(16, 5, 0)));
    }

    #[test]
    fn cutoff_is_exclusive_of_its_hour() {
        let schedule = schedule();
        assert!(schedule.adjustments_allowed(at(13, 59, 59)));
        assert!(!schedule.adjustments_allowed(at(14, 0, 0)));
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let clock = ManualClock::new(at(9, 15, 0));
        clock.advance(chrono::Duration::minutes(90));
        assert_eq!(clock.now(), at(10, 45, 0));
        clock.set(at(15, 30, 0));
        assert_eq!(clock.now(), at(15, 30, 0));
    }

    #[test]
    fn rejects_invalid_cutoff() {
        let config = EngineConfig {
            adjustment_cutoff_hour: 24,
            ..EngineConfig::default()
        };
        assert_eq!(
            SquareOffSchedule::from_config(&config),
            Err(ConfigError::InvalidCutoffHour(24))
        );
    }
}
