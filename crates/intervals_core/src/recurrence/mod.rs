//! Recurrence engine.
//!
//! # Responsibility
//! - Compute the next due occurrence from an anchor, a rule and `now`.
//! - Own the stall policy used by every due-date recomputation.
//!
//! # Invariants
//! - Calculator functions are pure; only the stall policy logs.

pub mod calculator;

pub use calculator::{
    add_steps, next_occurrence, resolve_next_due, start_of_day, DueComputation, RecurrenceError,
};
