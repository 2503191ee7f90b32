//! In-memory interval registry.
//!
//! # Responsibility
//! - Own the interval set in insertion order.
//! - Route user actions and clock ticks through the overdue state machine.
//! - Apply side effects: deferred actions, reminders, persistence, events.
//!
//! # Invariants
//! - The registry is the only writer of interval state.
//! - Every tick evaluates all intervals against one `now` snapshot.
//! - Unknown ids are ignored (`false`/`None`), never errors.
//! - Deferred actions for a removed interval can never resurrect it.
//! - Store and notifier failures become `EngineWarning`s; in-memory state
//!   stays authoritative.
//! - An interval that fails validation is left out of the saved list without
//!   blocking the others.

use crate::clock::Clock;
use crate::error::EngineWarning;
use crate::lifecycle::{
    DeferredAction, DeferredActionTable, DeferredKind, LifecycleEvent, OverdueStateMachine,
    SideEffect, StatusChange, TransitionOutcome,
};
use crate::model::interval::{IntervalEntity, IntervalId, IntervalPatch, NewInterval};
use crate::notify::{NotificationScheduler, NotifyError, ReminderRequest};
use crate::recurrence::RecurrenceError;
use crate::registry::events::{EventHub, RegistryEvent};
use crate::repo::interval_repo::IntervalStore;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

/// Coordinator for every interval mutation.
pub struct IntervalRegistry {
    intervals: IndexMap<IntervalId, IntervalEntity>,
    machine: OverdueStateMachine,
    deferred: DeferredActionTable,
    store: Box<dyn IntervalStore>,
    notifier: Box<dyn NotificationScheduler>,
    clock: Arc<dyn Clock>,
    events: EventHub,
    warnings: Vec<EngineWarning>,
}

impl IntervalRegistry {
    /// Creates an empty registry without reading the store.
    pub fn new(
        store: Box<dyn IntervalStore>,
        notifier: Box<dyn NotificationScheduler>,
        clock: Arc<dyn Clock>,
        machine: OverdueStateMachine,
    ) -> Self {
        Self {
            intervals: IndexMap::new(),
            machine,
            deferred: DeferredActionTable::new(),
            store,
            notifier,
            clock,
            events: EventHub::default(),
            warnings: Vec::new(),
        }
    }

    /// Creates a registry from the store's persisted intervals.
    ///
    /// A failed load starts empty and records a `PersistenceFailure` warning.
    pub fn load(
        store: Box<dyn IntervalStore>,
        notifier: Box<dyn NotificationScheduler>,
        clock: Arc<dyn Clock>,
        machine: OverdueStateMachine,
    ) -> Self {
        let mut registry = Self::new(store, notifier, clock, machine);
        let loaded = match registry.store.load_all() {
            Ok(loaded) => loaded,
            Err(err) => {
                registry.warn(EngineWarning::PersistenceFailure(err.to_string()));
                Vec::new()
            }
        };

        let mut restored = false;
        for mut entity in loaded {
            let id = entity.id;
            let status = entity.status;
            let effects = registry.machine.restore(&mut entity);
            restored |= entity.status != status;
            registry.intervals.insert(id, entity);
            registry.apply_effects(id, &effects);
        }
        if restored {
            registry.persist();
        }
        info!(
            "event=registry_load module=registry status=ok count={}",
            registry.intervals.len()
        );
        registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, id: IntervalId) -> Option<&IntervalEntity> {
        self.intervals.get(&id)
    }

    /// All intervals in insertion order.
    pub fn get_all(&self) -> Vec<&IntervalEntity> {
        self.intervals.values().collect()
    }

    /// Intervals whose `next_due` is before `now`, regardless of `status`.
    pub fn overdue_intervals(&self, now: NaiveDateTime) -> Vec<&IntervalEntity> {
        self.intervals
            .values()
            .filter(|entity| entity.is_past_due(now))
            .collect()
    }

    /// Subscribes to registry change events.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Drains warnings accumulated since the last call.
    pub fn take_warnings(&mut self) -> Vec<EngineWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Pending deferred actions for one interval.
    pub fn pending_deferred(&self, id: IntervalId) -> Vec<DeferredAction> {
        self.deferred.pending_for(id)
    }

    /// Adds a new `Normal` interval and returns its id.
    pub fn add(&mut self, draft: NewInterval) -> IntervalId {
        let now = self.clock.now();
        let (entity, stalled) = IntervalEntity::create(draft, now);
        let id = entity.id;
        self.intervals.insert(id, entity);
        if let Some(err) = stalled {
            self.report_stall(id, &err);
        }

        self.reschedule_notification(id);
        self.persist();
        self.events.publish(RegistryEvent::Added(id));
        info!("event=interval_add module=registry status=ok id={id}");
        id
    }

    /// Edits one interval. Returns `false` for unknown ids.
    pub fn update(&mut self, id: IntervalId, patch: IntervalPatch) -> bool {
        let now = self.clock.now();
        let Some(outcome) = self.apply_event(id, LifecycleEvent::Edited(patch), now) else {
            debug!("event=interval_update module=registry status=skipped id={id} reason=unknown_id");
            return false;
        };

        self.persist();
        self.events.publish(RegistryEvent::Updated(id));
        self.publish_change(outcome.change);
        info!("event=interval_update module=registry status=ok id={id}");
        true
    }

    /// Removes one interval, its reminder and its deferred actions.
    ///
    /// Returns `false` for unknown ids.
    pub fn remove(&mut self, id: IntervalId) -> bool {
        if self.intervals.shift_remove(&id).is_none() {
            debug!("event=interval_remove module=registry status=skipped id={id} reason=unknown_id");
            return false;
        }

        let cancelled = self.deferred.cancel_all(id);
        if let Err(err) = self.notifier.cancel(id) {
            self.report_notify(id, err);
        }
        self.persist();
        self.events.publish(RegistryEvent::Removed(id));
        info!("event=interval_remove module=registry status=ok id={id} cancelled_actions={cancelled}");
        true
    }

    /// Marks one interval completed now. Returns `false` for unknown ids.
    pub fn complete(&mut self, id: IntervalId) -> bool {
        let now = self.clock.now();
        let Some(outcome) = self.apply_event(id, LifecycleEvent::Completed, now) else {
            debug!("event=interval_complete module=registry status=skipped id={id} reason=unknown_id");
            return false;
        };

        self.persist();
        self.events.publish(RegistryEvent::Updated(id));
        self.publish_change(outcome.change);
        info!("event=interval_complete module=registry status=ok id={id}");
        true
    }

    /// Runs one evaluation pass against `now`.
    ///
    /// Order: drain reminder failures, fire due deferred actions, evaluate
    /// every interval, then persist once if anything changed. Returns the
    /// status changes in the order they happened.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<StatusChange> {
        let started_at = Instant::now();
        for failure in self.notifier.drain_failures() {
            self.report_notify(failure.id, failure.error);
        }

        let mut changes = Vec::new();
        let mut mutated = false;

        for action in self.deferred.take_due(now) {
            if let Some(outcome) = self.run_deferred(&action, now) {
                mutated |= outcome.mutated;
                changes.extend(outcome.change);
            }
        }

        let mut outcomes = Vec::new();
        for entity in self.intervals.values_mut() {
            let outcome = self.machine.apply(entity, LifecycleEvent::ClockTick, now);
            if outcome.mutated {
                outcomes.push((entity.id, outcome));
            }
        }
        for (id, outcome) in outcomes {
            mutated = true;
            let outcome = self.finish_transition(id, outcome);
            changes.extend(outcome.change);
        }

        if mutated {
            self.persist();
        }
        for change in &changes {
            self.events.publish(RegistryEvent::StatusChanged(*change));
        }
        debug!(
            "event=registry_tick module=registry status=ok intervals={} changes={} duration_us={}",
            self.intervals.len(),
            changes.len(),
            started_at.elapsed().as_micros()
        );
        changes
    }

    /// Fires a previously issued deferred action.
    ///
    /// Cancelled, superseded or already fired actions, and actions whose
    /// interval was removed, are no-ops returning `None`.
    pub fn fire_deferred(
        &mut self,
        action: DeferredAction,
        now: NaiveDateTime,
    ) -> Option<StatusChange> {
        if !self.deferred.claim(&action) {
            debug!(
                "event=deferred_fire module=registry status=skipped id={} kind={} reason=stale",
                action.interval_id,
                action.kind.as_str()
            );
            return None;
        }

        let outcome = self.run_deferred(&action, now)?;
        if outcome.mutated {
            self.persist();
        }
        self.publish_change(outcome.change);
        outcome.change
    }

    fn run_deferred(
        &mut self,
        action: &DeferredAction,
        now: NaiveDateTime,
    ) -> Option<TransitionOutcome> {
        let event = match action.kind {
            DeferredKind::GraceResolve => LifecycleEvent::GraceElapsed,
            DeferredKind::CompletionResolve => LifecycleEvent::CompletionResolved,
        };
        let outcome = self.apply_event(action.interval_id, event, now);
        if outcome.is_none() {
            debug!(
                "event=deferred_fire module=registry status=skipped id={} kind={} reason=unknown_id",
                action.interval_id,
                action.kind.as_str()
            );
        }
        outcome
    }

    fn apply_event(
        &mut self,
        id: IntervalId,
        event: LifecycleEvent,
        now: NaiveDateTime,
    ) -> Option<TransitionOutcome> {
        let entity = self.intervals.get_mut(&id)?;
        let outcome = self.machine.apply(entity, event, now);
        Some(self.finish_transition(id, outcome))
    }

    fn finish_transition(&mut self, id: IntervalId, outcome: TransitionOutcome) -> TransitionOutcome {
        if let Some(err) = &outcome.stalled {
            self.report_stall(id, err);
        }
        self.apply_effects(id, &outcome.effects);
        if let Some(change) = outcome.change {
            info!(
                "event=status_change module=registry status=ok id={id} from={} to={}",
                change.from.as_str(),
                change.to.as_str()
            );
        }
        outcome
    }

    fn apply_effects(&mut self, id: IntervalId, effects: &[SideEffect]) {
        for effect in effects {
            match *effect {
                SideEffect::RescheduleNotification => self.reschedule_notification(id),
                SideEffect::ScheduleGraceTimer(due_at) => {
                    self.deferred.schedule(id, DeferredKind::GraceResolve, due_at);
                }
                SideEffect::CancelGraceTimer => {
                    self.deferred.cancel(id, DeferredKind::GraceResolve);
                }
                SideEffect::ScheduleCompletionTimer(due_at) => {
                    self.deferred
                        .schedule(id, DeferredKind::CompletionResolve, due_at);
                }
            }
        }
    }

    // Cancel first so one id never has two pending reminders.
    fn reschedule_notification(&mut self, id: IntervalId) {
        let Some(entity) = self.intervals.get(&id) else {
            return;
        };
        let request = ReminderRequest::for_interval(entity);

        if let Err(err) = self.notifier.cancel(id) {
            self.report_notify(id, err);
        }
        if let Err(err) = self.notifier.schedule(request) {
            self.report_notify(id, err);
        }
    }

    /// Saves every valid interval; invalid ones stay in memory and are reported.
    fn persist(&mut self) {
        let mut snapshot = Vec::with_capacity(self.intervals.len());
        let mut skipped = Vec::new();
        for entity in self.intervals.values() {
            match entity.validate() {
                Ok(()) => snapshot.push(entity.clone()),
                Err(err) => skipped.push((entity.id, err)),
            }
        }
        for (id, err) in skipped {
            self.warn(EngineWarning::PersistenceFailure(format!(
                "interval {id} not saved: {err}"
            )));
        }
        if let Err(err) = self.store.save_all(&snapshot) {
            self.warn(EngineWarning::PersistenceFailure(err.to_string()));
        }
    }

    fn publish_change(&mut self, change: Option<StatusChange>) {
        if let Some(change) = change {
            self.events.publish(RegistryEvent::StatusChanged(change));
        }
    }

    fn report_stall(&mut self, id: IntervalId, err: &RecurrenceError) {
        self.warn(EngineWarning::ComputationStalled {
            id,
            message: err.to_string(),
        });
    }

    fn report_notify(&mut self, id: IntervalId, err: NotifyError) {
        let warning = match err {
            NotifyError::Denied => EngineWarning::NotificationDenied { id },
            other => EngineWarning::NotificationFailure {
                id,
                message: other.to_string(),
            },
        };
        self.warn(warning);
    }

    fn warn(&mut self, warning: EngineWarning) {
        warn!(
            "event=engine_warning module=registry status=degraded code={} detail={}",
            warning.code(),
            warning
        );
        self.events.publish(RegistryEvent::Warning(warning.clone()));
        self.warnings.push(warning);
    }
}
