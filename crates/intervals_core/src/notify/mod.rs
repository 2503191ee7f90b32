//! Reminder notification boundary.
//!
//! # Responsibility
//! - Define how the registry requests and cancels reminders.
//! - Provide a worker-thread dispatcher for blocking delivery backends.

pub mod scheduler;
pub mod worker;

pub use scheduler::{
    LogNotificationBackend, NoopNotificationScheduler, NotificationBackend,
    NotificationScheduler, NotifyError, NotifyFailure, NotifyResult, ReminderRequest,
};
pub use worker::ThreadedNotificationScheduler;
