//! Next-occurrence arithmetic.
//!
//! # Responsibility
//! - Roll an anchor forward by whole rule steps until it passes `now`.
//! - Apply calendar-month stepping with end-of-month clamping.
//! - Detect stalled arithmetic and apply the emergency one-day fallback.
//!
//! # Invariants
//! - A successful result is always strictly after `now`.
//! - Results are pure functions of `(anchor, rule, now)`.
//! - Every candidate is `anchor + k * step` for some `k >= 0`; stepping is
//!   never chained from a clamped intermediate date.

use crate::model::frequency::{FrequencyRule, FrequencyUnit};
use chrono::{Datelike, Duration, Months, NaiveDateTime, NaiveTime};
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};

// Extra single-step probes allowed after the direct estimate.
const MAX_CORRECTION_STEPS: i64 = 4;

/// Recurrence arithmetic failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    /// Stepping made no forward progress (calendar overflow).
    ComputationStalled {
        anchor: NaiveDateTime,
        rule: FrequencyRule,
    },
}

impl Display for RecurrenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ComputationStalled { anchor, rule } => write!(
                f,
                "recurrence made no progress from {anchor} with rule `{}`",
                rule.as_label()
            ),
        }
    }
}

impl Error for RecurrenceError {}

/// Result of a due-date recomputation after the stall policy is applied.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueComputation {
    pub next_due: NaiveDateTime,
    /// Set when the calculator stalled and the fallback date was used.
    pub stalled: Option<RecurrenceError>,
}

impl DueComputation {
    pub fn is_exact(&self) -> bool {
        self.stalled.is_none()
    }
}

/// Adds `steps` whole rule steps to `date`.
///
/// Fails closed: returns `date` unchanged when the arithmetic overflows.
pub fn add_steps(date: NaiveDateTime, rule: FrequencyRule, steps: i64) -> NaiveDateTime {
    if steps <= 0 {
        return date;
    }
    let advanced = match rule.fixed_days() {
        Some(days) => days
            .checked_mul(steps)
            .and_then(Duration::try_days)
            .and_then(|delta| date.checked_add_signed(delta)),
        None => i64::from(rule.count())
            .checked_mul(steps)
            .and_then(|months| u32::try_from(months).ok())
            .and_then(|months| date.checked_add_months(Months::new(months))),
    };
    advanced.unwrap_or(date)
}

/// Returns the first `anchor + k * step` (with `k >= 0`) strictly after `now`.
///
/// An anchor already in the future is returned as-is.
///
/// # Errors
/// - `ComputationStalled` when a step cannot be applied (overflow).
pub fn next_occurrence(
    anchor: NaiveDateTime,
    rule: FrequencyRule,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, RecurrenceError> {
    if anchor > now {
        return Ok(anchor);
    }

    let stalled = || RecurrenceError::ComputationStalled { anchor, rule };
    let mut steps = estimate_steps(anchor, rule, now).max(1);
    for _ in 0..=MAX_CORRECTION_STEPS {
        let candidate = add_steps(anchor, rule, steps);
        if candidate == anchor {
            return Err(stalled());
        }
        if candidate > now {
            return Ok(candidate);
        }
        steps = steps.checked_add(1).ok_or_else(stalled)?;
    }

    Err(stalled())
}

/// Truncates a timestamp to the start of its day.
pub fn start_of_day(value: NaiveDateTime) -> NaiveDateTime {
    value.date().and_time(NaiveTime::MIN)
}

/// Computes the next due date for an interval reference point.
///
/// Date-only intervals are anchored at midnight, so every result is midnight
/// too. A stalled calculation falls back to one day after `now`.
pub fn resolve_next_due(
    reference: NaiveDateTime,
    rule: FrequencyRule,
    include_time: bool,
    now: NaiveDateTime,
) -> DueComputation {
    let anchor = if include_time {
        reference
    } else {
        start_of_day(reference)
    };

    match next_occurrence(anchor, rule, now) {
        Ok(next_due) => DueComputation {
            next_due,
            stalled: None,
        },
        Err(err) => {
            error!(
                "event=recurrence_stalled module=recurrence status=error rule={} error={}",
                rule.as_label(),
                err
            );
            DueComputation {
                next_due: emergency_step(now, include_time),
                stalled: Some(err),
            }
        }
    }
}

fn emergency_step(now: NaiveDateTime, include_time: bool) -> NaiveDateTime {
    let base = if include_time { now } else { start_of_day(now) };
    Duration::try_days(1)
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(now)
}

// Lower bound on the number of whole steps between `anchor` and `now`.
fn estimate_steps(anchor: NaiveDateTime, rule: FrequencyRule, now: NaiveDateTime) -> i64 {
    match rule.unit() {
        FrequencyUnit::Days | FrequencyUnit::Weeks => {
            let step_seconds = rule.fixed_days().unwrap_or(1).saturating_mul(86_400);
            (now - anchor).num_seconds() / step_seconds.max(1)
        }
        FrequencyUnit::Months => {
            let months = (i64::from(now.year()) - i64::from(anchor.year())) * 12
                + i64::from(now.month())
                - i64::from(anchor.month());
            months / i64::from(rule.count())
        }
    }
}
