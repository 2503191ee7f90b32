//! Interval domain model.
//!
//! # Responsibility
//! - Define the recurring-task record and its mutating operations.
//! - Keep `next_due` derived from one explicit reference point.
//!
//! # Invariants
//! - `id` is stable and never reused for another interval.
//! - `next_due` is always recomputed through `resolve_next_due` from
//!   `reference_point()`; it is never left unset.
//! - `became_overdue_at` is `Some` exactly while `status == Overdue`.
//! - Date-only intervals keep `start_date` and `next_due` at midnight.

use crate::model::frequency::FrequencyRule;
use crate::recurrence::{resolve_next_due, start_of_day, RecurrenceError};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one interval.
pub type IntervalId = Uuid;

/// Due-state of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalStatus {
    /// Waiting for the next due date.
    Normal,
    /// Due date has passed without completion.
    Overdue,
    /// Just completed; resolves back to `Normal` after a short delay.
    Completing,
}

impl IntervalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Overdue => "overdue",
            Self::Completing => "completing",
        }
    }
}

/// Validation errors checked before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalValidationError {
    NilId,
    EmptyName,
}

impl Display for IntervalValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "interval id must not be nil"),
            Self::EmptyName => write!(f, "interval name must not be empty"),
        }
    }
}

impl Error for IntervalValidationError {}

/// Input for creating one interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInterval {
    pub name: String,
    pub start_date: NaiveDateTime,
    pub frequency: FrequencyRule,
    pub include_time: bool,
}

/// Partial edit; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalPatch {
    pub name: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub frequency: Option<FrequencyRule>,
    pub include_time: Option<bool>,
}

impl IntervalPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.start_date.is_none()
            && self.frequency.is_none()
            && self.include_time.is_none()
    }
}

/// Outcome of one clock evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Unchanged,
    BecameOverdue,
    /// Grace period ran out; `next_due` was rolled forward.
    GraceElapsed { stalled: Option<RecurrenceError> },
}

/// Canonical recurring-task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalEntity {
    pub id: IntervalId,
    pub name: String,
    pub start_date: NaiveDateTime,
    pub include_time: bool,
    pub last_completed: Option<NaiveDateTime>,
    pub next_due: NaiveDateTime,
    pub frequency: FrequencyRule,
    pub status: IntervalStatus,
    pub became_overdue_at: Option<NaiveDateTime>,
}

impl IntervalEntity {
    /// Creates a `Normal` interval with `next_due` computed against `now`.
    pub fn create(draft: NewInterval, now: NaiveDateTime) -> (Self, Option<RecurrenceError>) {
        Self::create_with_id(Uuid::new_v4(), draft, now)
    }

    /// Creates an interval with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn create_with_id(
        id: IntervalId,
        draft: NewInterval,
        now: NaiveDateTime,
    ) -> (Self, Option<RecurrenceError>) {
        let start_date = normalize_start(draft.start_date, draft.include_time);
        let mut entity = Self {
            id,
            name: draft.name,
            start_date,
            include_time: draft.include_time,
            last_completed: None,
            next_due: start_date,
            frequency: draft.frequency,
            status: IntervalStatus::Normal,
            became_overdue_at: None,
        };
        let stalled = entity.recompute_next_due(now);
        (entity, stalled)
    }

    /// Timestamp recurrence arithmetic runs from.
    pub fn reference_point(&self) -> NaiveDateTime {
        self.last_completed.unwrap_or(self.start_date)
    }

    /// Recomputes `next_due` from `reference_point()`.
    ///
    /// Returns the stall error when the fallback date had to be used.
    pub fn recompute_next_due(&mut self, now: NaiveDateTime) -> Option<RecurrenceError> {
        let computed =
            resolve_next_due(self.reference_point(), self.frequency, self.include_time, now);
        self.next_due = computed.next_due;
        computed.stalled
    }

    /// Applies an edit, recomputes `next_due` and resets status to `Normal`.
    pub fn edit(&mut self, patch: IntervalPatch, now: NaiveDateTime) -> Option<RecurrenceError> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(include_time) = patch.include_time {
            self.include_time = include_time;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(frequency) = patch.frequency {
            self.frequency = frequency;
        }
        self.start_date = normalize_start(self.start_date, self.include_time);

        let stalled = self.recompute_next_due(now);
        self.status = IntervalStatus::Normal;
        self.became_overdue_at = None;
        stalled
    }

    /// Records a completion at `now` and enters `Completing`.
    pub fn mark_completed(&mut self, now: NaiveDateTime) -> Option<RecurrenceError> {
        self.last_completed = Some(now);
        self.status = IntervalStatus::Completing;
        self.became_overdue_at = None;
        self.recompute_next_due(now)
    }

    /// Ends the `Completing` transient. Returns whether the status changed.
    pub fn resolve_completion(&mut self) -> bool {
        if self.status != IntervalStatus::Completing {
            return false;
        }
        self.status = IntervalStatus::Normal;
        true
    }

    /// Rolls an overdue interval forward and returns it to `Normal`.
    ///
    /// No-op (returns `None`) for intervals that are not overdue.
    pub fn resolve_grace(&mut self, now: NaiveDateTime) -> Option<Evaluation> {
        if self.status != IntervalStatus::Overdue {
            return None;
        }
        let stalled = self.recompute_next_due(now);
        self.status = IntervalStatus::Normal;
        self.became_overdue_at = None;
        Some(Evaluation::GraceElapsed { stalled })
    }

    /// Evaluates the clock-driven transitions against `now`.
    ///
    /// - `Normal` and due: becomes `Overdue`, `became_overdue_at = now`.
    /// - `Overdue` for at least `grace_period`: rolls forward to `Normal`.
    /// - `Completing`: never changes here.
    pub fn evaluate(&mut self, now: NaiveDateTime, grace_period: Duration) -> Evaluation {
        match self.status {
            IntervalStatus::Normal if now >= self.next_due => {
                self.status = IntervalStatus::Overdue;
                self.became_overdue_at = Some(now);
                Evaluation::BecameOverdue
            }
            IntervalStatus::Overdue => {
                // Rows restored without a marker count from the due date.
                let since = self.became_overdue_at.unwrap_or(self.next_due);
                if now - since >= grace_period {
                    self.resolve_grace(now).unwrap_or(Evaluation::Unchanged)
                } else {
                    Evaluation::Unchanged
                }
            }
            _ => Evaluation::Unchanged,
        }
    }

    /// Wall-clock check independent of `status`.
    pub fn is_past_due(&self, now: NaiveDateTime) -> bool {
        self.next_due < now
    }

    /// Human-readable next-due label for list rows.
    pub fn due_label(&self) -> String {
        if self.include_time {
            self.next_due.format("%b %-d, %Y %H:%M").to_string()
        } else {
            self.next_due.format("%b %-d, %Y").to_string()
        }
    }

    /// Validates persistence-level invariants.
    pub fn validate(&self) -> Result<(), IntervalValidationError> {
        if self.id.is_nil() {
            return Err(IntervalValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(IntervalValidationError::EmptyName);
        }
        Ok(())
    }
}

/// Combines a calendar date with an optional time of day.
///
/// `None` yields a date-only (midnight) start.
pub fn compose_start(date: NaiveDate, time: Option<NaiveTime>) -> NaiveDateTime {
    date.and_time(time.unwrap_or(NaiveTime::MIN))
}

fn normalize_start(start_date: NaiveDateTime, include_time: bool) -> NaiveDateTime {
    if include_time {
        start_date
    } else {
        start_of_day(start_date)
    }
}
