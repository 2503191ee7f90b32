//! Repeat frequency rule.
//!
//! # Responsibility
//! - Describe how far apart two consecutive due dates are.
//! - Parse and render the compact labels used by CLI/FFI input surfaces.
//!
//! # Invariants
//! - `count` is always >= 1, including for deserialized values.
//! - `Weeks(n)` behaves like `Days(7n)` for arithmetic, but keeps its own unit.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Largest count accepted from user-facing input (add/edit form stepper range).
pub const MAX_INPUT_COUNT: u32 = 365;

static FREQUENCY_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:every\s+)?(\d+)\s*(d|days?|w|weeks?|m|months?)$")
        .expect("valid frequency label regex")
});

/// Calendar unit of one rule step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
}

impl FrequencyUnit {
    fn short(self) -> char {
        match self {
            Self::Days => 'd',
            Self::Weeks => 'w',
            Self::Months => 'm',
        }
    }

    fn noun(self, plural: bool) -> &'static str {
        match (self, plural) {
            (Self::Days, false) => "day",
            (Self::Days, true) => "days",
            (Self::Weeks, false) => "week",
            (Self::Weeks, true) => "weeks",
            (Self::Months, false) => "month",
            (Self::Months, true) => "months",
        }
    }
}

/// Frequency rule construction/parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrequencyError {
    /// Step count must be a positive integer.
    ZeroCount,
    /// Step count exceeds the input-surface limit.
    CountTooLarge(u32),
    /// Label did not match any known shape.
    InvalidLabel(String),
}

impl Display for FrequencyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroCount => write!(f, "frequency count must be >= 1"),
            Self::CountTooLarge(count) => write!(
                f,
                "frequency count {count} exceeds maximum {MAX_INPUT_COUNT}"
            ),
            Self::InvalidLabel(value) => write!(f, "unrecognized frequency label `{value}`"),
        }
    }
}

impl Error for FrequencyError {}

/// Fixed-count day/week/month repeat rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FrequencyRuleWire")]
pub struct FrequencyRule {
    unit: FrequencyUnit,
    count: u32,
}

#[derive(Deserialize)]
struct FrequencyRuleWire {
    unit: FrequencyUnit,
    count: u32,
}

impl TryFrom<FrequencyRuleWire> for FrequencyRule {
    type Error = FrequencyError;

    fn try_from(value: FrequencyRuleWire) -> Result<Self, Self::Error> {
        Self::new(value.unit, value.count)
    }
}

impl FrequencyRule {
    /// Creates a rule, rejecting a zero step count.
    pub fn new(unit: FrequencyUnit, count: u32) -> Result<Self, FrequencyError> {
        if count == 0 {
            return Err(FrequencyError::ZeroCount);
        }
        Ok(Self { unit, count })
    }

    pub fn days(count: u32) -> Result<Self, FrequencyError> {
        Self::new(FrequencyUnit::Days, count)
    }

    pub fn weeks(count: u32) -> Result<Self, FrequencyError> {
        Self::new(FrequencyUnit::Weeks, count)
    }

    pub fn months(count: u32) -> Result<Self, FrequencyError> {
        Self::new(FrequencyUnit::Months, count)
    }

    pub fn unit(&self) -> FrequencyUnit {
        self.unit
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Length of one step in whole days, or `None` for calendar-month rules.
    pub fn fixed_days(&self) -> Option<i64> {
        match self.unit {
            FrequencyUnit::Days => Some(i64::from(self.count)),
            FrequencyUnit::Weeks => Some(7 * i64::from(self.count)),
            FrequencyUnit::Months => None,
        }
    }

    /// Parses user input such as `3d`, `2 weeks`, `every 1 month` or `daily`.
    ///
    /// Counts are limited to `1..=MAX_INPUT_COUNT`.
    pub fn parse(input: &str) -> Result<Self, FrequencyError> {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "daily" => return Self::days(1),
            "weekly" => return Self::weeks(1),
            "monthly" => return Self::months(1),
            _ => {}
        }

        let caps = FREQUENCY_LABEL_RE
            .captures(trimmed)
            .ok_or_else(|| FrequencyError::InvalidLabel(trimmed.to_string()))?;
        let count = caps[1]
            .parse::<u32>()
            .map_err(|_| FrequencyError::InvalidLabel(trimmed.to_string()))?;
        if count > MAX_INPUT_COUNT {
            return Err(FrequencyError::CountTooLarge(count));
        }
        let unit = match caps[2].chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('d') => FrequencyUnit::Days,
            Some('w') => FrequencyUnit::Weeks,
            _ => FrequencyUnit::Months,
        };
        Self::new(unit, count)
    }

    /// Compact label accepted by [`FrequencyRule::parse`], e.g. `3d`.
    pub fn as_label(&self) -> String {
        format!("{}{}", self.count, self.unit.short())
    }
}

impl Display for FrequencyRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.count == 1 {
            write!(f, "every {}", self.unit.noun(false))
        } else {
            write!(f, "every {} {}", self.count, self.unit.noun(true))
        }
    }
}
