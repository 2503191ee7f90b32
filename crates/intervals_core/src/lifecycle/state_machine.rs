//! Overdue state machine.
//!
//! # Responsibility
//! - Map lifecycle events onto interval mutations.
//! - Report the status change and the side effects the owner must apply.
//!
//! # Invariants
//! - The machine never touches notification or timer state itself; it only
//!   describes effects.
//! - Timer events (`GraceElapsed`, `CompletionResolved`) are no-ops unless the
//!   interval is still in the state that scheduled them.
//! - There is no terminal state; removal is handled by the owner.
//! - Timer deadlines saturate instead of overflowing.

use crate::model::interval::{
    Evaluation, IntervalEntity, IntervalId, IntervalPatch, IntervalStatus,
};
use crate::recurrence::RecurrenceError;
use chrono::{Duration, NaiveDateTime};

/// Input event for one interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Periodic clock evaluation.
    ClockTick,
    /// User completed the interval.
    Completed,
    /// User edited the interval.
    Edited(IntervalPatch),
    /// Grace-period deferred action fired.
    GraceElapsed,
    /// Completion-resolve deferred action fired.
    CompletionResolved,
}

/// Effect the owner applies after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Cancel then schedule the reminder for the current `next_due`.
    RescheduleNotification,
    ScheduleGraceTimer(NaiveDateTime),
    CancelGraceTimer,
    ScheduleCompletionTimer(NaiveDateTime),
}

/// Observable status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub id: IntervalId,
    pub from: IntervalStatus,
    pub to: IntervalStatus,
}

/// Result of applying one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub change: Option<StatusChange>,
    pub effects: Vec<SideEffect>,
    /// Recomputation fell back to the emergency step.
    pub stalled: Option<RecurrenceError>,
    /// Event mutated the interval fields (even without a status change).
    pub mutated: bool,
}

impl TransitionOutcome {
    fn unchanged() -> Self {
        Self::default()
    }
}

/// Timing policy of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverdueStateMachine {
    grace_period: Duration,
    completion_delay: Duration,
}

impl Default for OverdueStateMachine {
    fn default() -> Self {
        Self::new(Duration::hours(12), Duration::seconds(2))
    }
}

impl OverdueStateMachine {
    pub fn new(grace_period: Duration, completion_delay: Duration) -> Self {
        Self {
            grace_period,
            completion_delay,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn completion_delay(&self) -> Duration {
        self.completion_delay
    }

    /// Applies `event` to `entity` at `now`.
    pub fn apply(
        &self,
        entity: &mut IntervalEntity,
        event: LifecycleEvent,
        now: NaiveDateTime,
    ) -> TransitionOutcome {
        let from = entity.status;
        let mut outcome = match event {
            LifecycleEvent::ClockTick => self.on_tick(entity, now),
            LifecycleEvent::GraceElapsed => match entity.resolve_grace(now) {
                Some(Evaluation::GraceElapsed { stalled }) => TransitionOutcome {
                    effects: vec![SideEffect::RescheduleNotification],
                    stalled,
                    mutated: true,
                    ..TransitionOutcome::default()
                },
                _ => TransitionOutcome::unchanged(),
            },
            LifecycleEvent::Completed => {
                let stalled = entity.mark_completed(now);
                TransitionOutcome {
                    effects: vec![
                        SideEffect::CancelGraceTimer,
                        SideEffect::ScheduleCompletionTimer(deadline(now, self.completion_delay)),
                        SideEffect::RescheduleNotification,
                    ],
                    stalled,
                    mutated: true,
                    ..TransitionOutcome::default()
                }
            }
            LifecycleEvent::Edited(patch) => {
                let stalled = entity.edit(patch, now);
                // A pending completion resolve stays armed; it no-ops on Normal.
                TransitionOutcome {
                    effects: vec![
                        SideEffect::CancelGraceTimer,
                        SideEffect::RescheduleNotification,
                    ],
                    stalled,
                    mutated: true,
                    ..TransitionOutcome::default()
                }
            }
            LifecycleEvent::CompletionResolved => TransitionOutcome {
                mutated: entity.resolve_completion(),
                ..TransitionOutcome::default()
            },
        };

        if entity.status != from {
            outcome.change = Some(StatusChange {
                id: entity.id,
                from,
                to: entity.status,
            });
        }
        outcome
    }

    /// Re-arms runtime state for an interval restored from storage.
    ///
    /// A persisted `Completing` transient has lost its timer and resolves to
    /// `Normal` immediately.
    pub fn restore(&self, entity: &mut IntervalEntity) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        match entity.status {
            IntervalStatus::Overdue => {
                let since = entity.became_overdue_at.unwrap_or(entity.next_due);
                effects.push(SideEffect::ScheduleGraceTimer(deadline(since, self.grace_period)));
            }
            IntervalStatus::Completing => {
                entity.resolve_completion();
            }
            IntervalStatus::Normal => {}
        }
        effects.push(SideEffect::RescheduleNotification);
        effects
    }

    fn on_tick(&self, entity: &mut IntervalEntity, now: NaiveDateTime) -> TransitionOutcome {
        match entity.evaluate(now, self.grace_period) {
            Evaluation::Unchanged => TransitionOutcome::unchanged(),
            Evaluation::BecameOverdue => TransitionOutcome {
                effects: vec![
                    SideEffect::ScheduleGraceTimer(deadline(now, self.grace_period)),
                    SideEffect::RescheduleNotification,
                ],
                mutated: true,
                ..TransitionOutcome::default()
            },
            Evaluation::GraceElapsed { stalled } => TransitionOutcome {
                effects: vec![
                    SideEffect::CancelGraceTimer,
                    SideEffect::RescheduleNotification,
                ],
                stalled,
                mutated: true,
                ..TransitionOutcome::default()
            },
        }
    }
}

/// `from + delay`, saturating at the latest representable instant.
fn deadline(from: NaiveDateTime, delay: Duration) -> NaiveDateTime {
    from.checked_add_signed(delay).unwrap_or(NaiveDateTime::MAX)
}

#[cfg(test)]
mod tests {
    use super::{LifecycleEvent, OverdueStateMachine, SideEffect};
    use crate::model::frequency::FrequencyRule;
    use crate::model::interval::{IntervalEntity, IntervalStatus, NewInterval};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn daily(now: NaiveDateTime) -> IntervalEntity {
        IntervalEntity::create(
            NewInterval {
                name: "stretch".to_string(),
                start_date: now,
                frequency: FrequencyRule::days(1).unwrap(),
                include_time: true,
            },
            now,
        )
        .0
    }

    #[test]
    fn tick_past_due_enters_overdue_and_arms_grace_timer() {
        let machine = OverdueStateMachine::default();
        let mut entity = daily(at(1, 9));
        let now = at(2, 9);

        let outcome = machine.apply(&mut entity, LifecycleEvent::ClockTick, now);
        let change = outcome.change.expect("status should change");
        assert_eq!(change.from, IntervalStatus::Normal);
        assert_eq!(change.to, IntervalStatus::Overdue);
        assert_eq!(entity.became_overdue_at, Some(now));
        assert!(outcome
            .effects
            .contains(&SideEffect::ScheduleGraceTimer(now + Duration::hours(12))));
    }

    #[test]
    fn grace_timer_on_normal_interval_is_noop() {
        let machine = OverdueStateMachine::default();
        let mut entity = daily(at(1, 9));
        let before = entity.clone();

        let outcome = machine.apply(&mut entity, LifecycleEvent::GraceElapsed, at(1, 10));
        assert!(outcome.change.is_none());
        assert!(!outcome.mutated);
        assert_eq!(entity, before);
    }

    #[test]
    fn completing_ignores_clock_ticks() {
        let machine = OverdueStateMachine::default();
        let mut entity = daily(at(1, 9));
        machine.apply(&mut entity, LifecycleEvent::Completed, at(1, 9));

        let outcome = machine.apply(&mut entity, LifecycleEvent::ClockTick, at(5, 9));
        assert!(outcome.change.is_none());
        assert_eq!(entity.status, IntervalStatus::Completing);
    }

    #[test]
    fn restore_rearms_grace_timer_from_marker() {
        let machine = OverdueStateMachine::default();
        let mut entity = daily(at(1, 9));
        entity.status = IntervalStatus::Overdue;
        entity.became_overdue_at = Some(at(2, 9));

        let effects = machine.restore(&mut entity);
        assert_eq!(effects[0], SideEffect::ScheduleGraceTimer(at(2, 21)));
        assert_eq!(entity.status, IntervalStatus::Overdue);
    }

    #[test]
    fn restore_resolves_stale_completing_transient() {
        let machine = OverdueStateMachine::default();
        let mut entity = daily(at(1, 9));
        machine.apply(&mut entity, LifecycleEvent::Completed, at(1, 10));

        let effects = machine.restore(&mut entity);
        assert_eq!(entity.status, IntervalStatus::Normal);
        assert_eq!(effects, vec![SideEffect::RescheduleNotification]);
    }

    #[test]
    fn oversized_delays_saturate_instead_of_overflowing() {
        let huge = Duration::days(1_000_000_000);
        let machine = OverdueStateMachine::new(huge, huge);
        let mut entity = daily(at(1, 9));

        let outcome = machine.apply(&mut entity, LifecycleEvent::ClockTick, at(2, 9));
        assert_eq!(entity.status, IntervalStatus::Overdue);
        assert!(outcome
            .effects
            .contains(&SideEffect::ScheduleGraceTimer(NaiveDateTime::MAX)));

        let effects = machine.restore(&mut entity);
        assert_eq!(effects[0], SideEffect::ScheduleGraceTimer(NaiveDateTime::MAX));

        let outcome = machine.apply(&mut entity, LifecycleEvent::Completed, at(2, 10));
        assert!(outcome
            .effects
            .contains(&SideEffect::ScheduleCompletionTimer(NaiveDateTime::MAX)));
    }
}
