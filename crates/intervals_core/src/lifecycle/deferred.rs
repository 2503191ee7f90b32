//! Cancellable deferred actions keyed by interval.
//!
//! # Responsibility
//! - Track the grace-period and completion-resolve deadlines per interval.
//! - Hand out due actions in deadline order.
//!
//! # Invariants
//! - At most one pending action per `(interval, kind)` slot.
//! - Every scheduled action gets a fresh token; only the pending token can be
//!   claimed, so a cancelled or superseded action never fires.

use crate::model::interval::IntervalId;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// What a deferred action does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredKind {
    /// Overdue -> Normal after the grace period.
    GraceResolve,
    /// Completing -> Normal after the resolve delay.
    CompletionResolve,
}

impl DeferredKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GraceResolve => "grace_resolve",
            Self::CompletionResolve => "completion_resolve",
        }
    }
}

/// Handle for one scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredAction {
    pub interval_id: IntervalId,
    pub kind: DeferredKind,
    pub due_at: NaiveDateTime,
    pub token: u64,
}

/// Pending deferred actions owned by the registry.
#[derive(Debug, Default)]
pub struct DeferredActionTable {
    next_token: u64,
    pending: HashMap<(IntervalId, DeferredKind), DeferredAction>,
}

impl DeferredActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedules an action, replacing any pending one in the same slot.
    pub fn schedule(
        &mut self,
        interval_id: IntervalId,
        kind: DeferredKind,
        due_at: NaiveDateTime,
    ) -> DeferredAction {
        self.next_token += 1;
        let action = DeferredAction {
            interval_id,
            kind,
            due_at,
            token: self.next_token,
        };
        self.pending.insert((interval_id, kind), action);
        action
    }

    /// Cancels one slot. Returns whether something was pending.
    pub fn cancel(&mut self, interval_id: IntervalId, kind: DeferredKind) -> bool {
        self.pending.remove(&(interval_id, kind)).is_some()
    }

    /// Cancels every slot of one interval. Returns the number removed.
    pub fn cancel_all(&mut self, interval_id: IntervalId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(id, _), _| *id != interval_id);
        before - self.pending.len()
    }

    /// Removes `action` if it is still the pending one for its slot.
    ///
    /// Stale handles (cancelled, superseded or already fired) return `false`.
    pub fn claim(&mut self, action: &DeferredAction) -> bool {
        let key = (action.interval_id, action.kind);
        match self.pending.get(&key) {
            Some(current) if current.token == action.token => {
                self.pending.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Pops every action with `due_at <= now`, ordered by deadline then token.
    pub fn take_due(&mut self, now: NaiveDateTime) -> Vec<DeferredAction> {
        let mut due = self
            .pending
            .values()
            .filter(|action| action.due_at <= now)
            .copied()
            .collect::<Vec<_>>();
        for action in &due {
            self.pending.remove(&(action.interval_id, action.kind));
        }
        due.sort_by_key(|action| (action.due_at, action.token));
        due
    }

    /// Pending actions for one interval, ordered by deadline.
    pub fn pending_for(&self, interval_id: IntervalId) -> Vec<DeferredAction> {
        let mut actions = self
            .pending
            .values()
            .filter(|action| action.interval_id == interval_id)
            .copied()
            .collect::<Vec<_>>();
        actions.sort_by_key(|action| (action.due_at, action.token));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::{DeferredActionTable, DeferredKind};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use uuid::Uuid;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn reschedule_supersedes_previous_token() {
        let mut table = DeferredActionTable::new();
        let id = Uuid::new_v4();
        let first = table.schedule(id, DeferredKind::GraceResolve, base());
        let second = table.schedule(id, DeferredKind::GraceResolve, base());

        assert_eq!(table.len(), 1);
        assert!(!table.claim(&first));
        assert!(table.claim(&second));
        assert!(!table.claim(&second));
    }

    #[test]
    fn cancel_all_clears_every_slot_of_one_interval() {
        let mut table = DeferredActionTable::new();
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        table.schedule(id, DeferredKind::GraceResolve, base());
        table.schedule(id, DeferredKind::CompletionResolve, base());
        table.schedule(other, DeferredKind::GraceResolve, base());

        assert_eq!(table.cancel_all(id), 2);
        assert!(table.pending_for(id).is_empty());
        assert_eq!(table.pending_for(other).len(), 1);
    }

    #[test]
    fn take_due_returns_only_reached_deadlines_in_order() {
        let mut table = DeferredActionTable::new();
        let late = table.schedule(
            Uuid::new_v4(),
            DeferredKind::GraceResolve,
            base() + Duration::hours(2),
        );
        let early = table.schedule(
            Uuid::new_v4(),
            DeferredKind::CompletionResolve,
            base() + Duration::hours(1),
        );
        let future = table.schedule(
            Uuid::new_v4(),
            DeferredKind::GraceResolve,
            base() + Duration::hours(5),
        );

        let due = table.take_due(base() + Duration::hours(2));
        assert_eq!(due, vec![early, late]);
        assert_eq!(table.len(), 1);
        assert!(table.claim(&future));
    }
}
