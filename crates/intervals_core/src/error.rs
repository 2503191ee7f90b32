//! Non-fatal engine warnings.
//!
//! # Responsibility
//! - Classify side-channel failures surfaced to callers without aborting.
//!
//! # Invariants
//! - No warning leaves the registry in an inconsistent state; in-memory
//!   intervals stay authoritative.

use crate::model::interval::IntervalId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Warning surfaced by registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineWarning {
    /// Recurrence arithmetic stalled; the emergency one-day step was used.
    ComputationStalled { id: IntervalId, message: String },
    /// Loading or saving the interval list failed.
    PersistenceFailure(String),
    /// The notification backend refused permission.
    NotificationDenied { id: IntervalId },
    /// Scheduling or cancelling a reminder failed.
    NotificationFailure { id: IntervalId, message: String },
}

impl EngineWarning {
    /// Stable machine-readable code for logs and FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ComputationStalled { .. } => "computation_stalled",
            Self::PersistenceFailure(_) => "persistence_failure",
            Self::NotificationDenied { .. } => "notification_denied",
            Self::NotificationFailure { .. } => "notification_failure",
        }
    }
}

impl Display for EngineWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ComputationStalled { id, message } => {
                write!(f, "due date computation stalled for {id}: {message}")
            }
            Self::PersistenceFailure(message) => write!(f, "failed to persist intervals: {message}"),
            Self::NotificationDenied { id } => {
                write!(f, "notification permission denied for {id}")
            }
            Self::NotificationFailure { id, message } => {
                write!(f, "notification request failed for {id}: {message}")
            }
        }
    }
}

impl Error for EngineWarning {}
