//! Core domain logic for recurring intervals.
//! This crate is the single source of truth for due-date and lifecycle rules.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod registry;
pub mod repo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use error::EngineWarning;
pub use lifecycle::{
    DeferredAction, DeferredKind, LifecycleEvent, OverdueStateMachine, SideEffect, StatusChange,
};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::frequency::{FrequencyError, FrequencyRule, FrequencyUnit};
pub use model::interval::{
    compose_start, IntervalEntity, IntervalId, IntervalPatch, IntervalStatus,
    IntervalValidationError, NewInterval,
};
pub use notify::{
    LogNotificationBackend, NoopNotificationScheduler, NotificationBackend,
    NotificationScheduler, NotifyError, NotifyFailure, NotifyResult, ReminderRequest,
    ThreadedNotificationScheduler,
};
pub use recurrence::{next_occurrence, RecurrenceError};
pub use registry::{IntervalRegistry, RegistryEvent};
pub use repo::interval_repo::{
    IntervalStore, MemoryIntervalStore, RepoError, RepoResult, SqliteIntervalStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
