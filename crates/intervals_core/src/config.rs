//! Engine timing configuration.
//!
//! # Responsibility
//! - Hold the grace period, completion delay and tick cadence.
//! - Load overrides from JSON with per-field defaults.
//!
//! # Invariants
//! - Every duration is strictly positive and bounded after `validate()`.

use crate::lifecycle::OverdueStateMachine;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const MAX_GRACE_PERIOD_SECS: u64 = 366 * 24 * 60 * 60;
const MAX_COMPLETION_DELAY_MS: u64 = 60 * 60 * 1_000;
const MAX_TICK_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Engine timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Time an interval may stay overdue before it auto-advances.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Duration of the `Completing` transient.
    #[serde(default = "default_completion_delay_ms")]
    pub completion_delay_ms: u64,
    /// Cadence of the periodic tick.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_grace_period_secs() -> u64 {
    12 * 60 * 60
}

fn default_completion_delay_ms() -> u64 {
    2_000
}

fn default_tick_interval_secs() -> u64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            completion_delay_ms: default_completion_delay_ms(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_secs == 0 {
            return Err(ConfigError::Invalid("grace_period_secs must be > 0"));
        }
        if self.completion_delay_ms == 0 {
            return Err(ConfigError::Invalid("completion_delay_ms must be > 0"));
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid("tick_interval_secs must be > 0"));
        }
        if self.grace_period_secs > MAX_GRACE_PERIOD_SECS {
            return Err(ConfigError::Invalid("grace_period_secs must be at most 366 days"));
        }
        if self.completion_delay_ms > MAX_COMPLETION_DELAY_MS {
            return Err(ConfigError::Invalid("completion_delay_ms must be at most one hour"));
        }
        if self.tick_interval_secs > MAX_TICK_INTERVAL_SECS {
            return Err(ConfigError::Invalid("tick_interval_secs must be at most one day"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs)
    }

    /// Builds the state machine timing policy.
    pub fn state_machine(&self) -> OverdueStateMachine {
        let grace = i64::try_from(self.grace_period_secs).unwrap_or(i64::MAX / 1_000);
        let delay = i64::try_from(self.completion_delay_ms).unwrap_or(i64::MAX / 1_000);
        OverdueStateMachine::new(
            chrono::Duration::try_seconds(grace).unwrap_or(chrono::Duration::MAX),
            chrono::Duration::try_milliseconds(delay).unwrap_or(chrono::Duration::MAX),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use chrono::Duration;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "grace_period_secs": 60 }"#).unwrap();
        assert_eq!(config.grace_period_secs, 60);
        assert_eq!(config.completion_delay_ms, 2_000);
        assert_eq!(config.tick_interval_secs, 5);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "tick_interval_secs": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "grace_period_secs": 10000000000000 }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json_str(r#"{ "completion_delay_ms": 3600001 }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let year = EngineConfig::from_json_str(r#"{ "grace_period_secs": 31622400 }"#).unwrap();
        assert_eq!(year.state_machine().grace_period(), Duration::days(366));
    }

    #[test]
    fn default_state_machine_uses_reference_timings() {
        let machine = EngineConfig::default().state_machine();
        assert_eq!(machine.grace_period(), Duration::hours(12));
        assert_eq!(machine.completion_delay(), Duration::seconds(2));
    }
}
