//! Interval domain model.
//!
//! # Responsibility
//! - Define the recurring-task record, its status and its frequency rule.
//! - Keep one explicit reference point for every recomputation.
//!
//! # Invariants
//! - Every interval is identified by a stable `IntervalId`.
//! - Frequency counts are positive.

pub mod frequency;
pub mod interval;
