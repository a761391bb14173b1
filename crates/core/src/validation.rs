//! Sanity checks applied to a freshly loaded configuration.

use thiserror::Error;

use crate::config::{AppConfig, EngineConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("square-off time {hour:02}:{minute:02} is not a valid time of day")]
    InvalidSquareOff { hour: u32, minute: u32 },

    #[error("adjustment cutoff hour {0} must be below 24")]
    InvalidCutoffHour(u32),

    #[error("trigger multiplier must be positive and finite, got {0}")]
    InvalidMultiplier(f64),

    #[error("distress band [{low}, {high}] is empty or non-finite")]
    InvalidBand { low: f64, high: f64 },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("terminal layout field `{0}` is empty")]
    EmptyLayoutField(&'static str),
}

/// Validates the whole application config.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    validate_engine(&config.engine)?;

    let layout = &config.terminal;
    for (name, value) in [
        ("terminal_sheet", &layout.terminal_sheet),
        ("input_sheet", &layout.input_sheet),
        ("chain_sheet", &layout.chain_sheet),
        ("exchange", &layout.exchange),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyLayoutField(name));
        }
    }
    Ok(())
}

/// Validates engine timing and trigger settings.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.square_off_time().is_none() {
        return Err(ConfigError::InvalidSquareOff {
            hour: engine.square_off_hour,
            minute: engine.square_off_minute,
        });
    }
    if engine.adjustment_cutoff_hour >= 24 {
        return Err(ConfigError::InvalidCutoffHour(engine.adjustment_cutoff_hour));
    }
    if !engine.trigger_multiplier.is_finite() || engine.trigger_multiplier <= 0.0 {
        return Err(ConfigError::InvalidMultiplier(engine.trigger_multiplier));
    }
    for band in &engine.distress_bands {
        if !band.low.is_finite() || !band.high.is_finite() || band.low > band.high {
            return Err(ConfigError::InvalidBand {
                low: band.low,
                high: band.high,
            });
        }
    }
    if engine.poll_interval_ms == 0 {
        return Err(ConfigError::ZeroInterval("poll_interval_ms"));
    }
    if engine.premium_poll_interval_ms == 0 {
        return Err(ConfigError::ZeroInterval("premium_poll_interval_ms"));
    }
    Ok(())
}
