//! Due-state lifecycle.
//!
//! # Responsibility
//! - Drive `Normal -> Overdue -> Completing -> Normal` transitions.
//! - Track cancellable grace and completion-resolve deadlines per interval.
//!
//! # See also
//! - `registry` for the owner that applies side effects.

pub mod deferred;
pub mod state_machine;

pub use deferred::{DeferredAction, DeferredActionTable, DeferredKind};
pub use state_machine::{
    LifecycleEvent, OverdueStateMachine, SideEffect, StatusChange, TransitionOutcome,
};
