//! Notification scheduling contracts.
//!
//! # Responsibility
//! - Define the reminder request shape and the scheduler boundary.
//! - Keep delivery failures reportable without blocking callers.
//!
//! # Invariants
//! - `NotificationScheduler` calls never block on delivery I/O.
//! - Callers cancel before scheduling, so one id has at most one reminder.

use crate::model::interval::{IntervalEntity, IntervalId};
use chrono::NaiveDateTime;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Notification delivery errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The platform refused notification permission.
    Denied,
    /// Backend-specific failure.
    Backend(String),
    /// The delivery worker is gone.
    Disconnected,
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied => write!(f, "notification permission denied"),
            Self::Backend(message) => write!(f, "notification backend error: {message}"),
            Self::Disconnected => write!(f, "notification worker disconnected"),
        }
    }
}

impl Error for NotifyError {}

/// Failure reported back from asynchronous delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyFailure {
    pub id: IntervalId,
    pub error: NotifyError,
}

/// One reminder to deliver at `fire_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub id: IntervalId,
    pub title: String,
    pub body: String,
    pub fire_at: NaiveDateTime,
}

impl ReminderRequest {
    /// Builds the reminder for the interval's current `next_due`.
    pub fn for_interval(entity: &IntervalEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.name.clone(),
            body: format!("Due {}", entity.due_label()),
            fire_at: entity.next_due,
        }
    }
}

/// Non-blocking reminder scheduling boundary used by the registry.
pub trait NotificationScheduler: Send {
    fn schedule(&mut self, request: ReminderRequest) -> NotifyResult<()>;
    fn cancel(&mut self, id: IntervalId) -> NotifyResult<()>;

    /// Drains failures reported since the last call.
    fn drain_failures(&mut self) -> Vec<NotifyFailure> {
        Vec::new()
    }
}

/// Blocking delivery backend driven by a worker thread.
pub trait NotificationBackend: Send + 'static {
    fn schedule(&mut self, request: &ReminderRequest) -> NotifyResult<()>;
    fn cancel(&mut self, id: IntervalId) -> NotifyResult<()>;
}

/// Scheduler that drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationScheduler;

impl NotificationScheduler for NoopNotificationScheduler {
    fn schedule(&mut self, _request: ReminderRequest) -> NotifyResult<()> {
        Ok(())
    }

    fn cancel(&mut self, _id: IntervalId) -> NotifyResult<()> {
        Ok(())
    }
}

/// Backend that only records reminders in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationBackend;

impl NotificationBackend for LogNotificationBackend {
    fn schedule(&mut self, request: &ReminderRequest) -> NotifyResult<()> {
        // Titles are user content; only metadata is logged.
        info!(
            "event=reminder_schedule module=notify status=ok id={} fire_at={}",
            request.id, request.fire_at
        );
        Ok(())
    }

    fn cancel(&mut self, id: IntervalId) -> NotifyResult<()> {
        info!("event=reminder_cancel module=notify status=ok id={id}");
        Ok(())
    }
}
