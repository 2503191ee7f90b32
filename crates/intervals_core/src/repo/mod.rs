//! Repository layer for interval persistence.
//!
//! # Responsibility
//! - Define the load-all/save-all contract consumed by the registry.
//! - Isolate SQLite query details from lifecycle orchestration.
//!
//! # Invariants
//! - Writes enforce `IntervalEntity::validate()` before persistence.
//! - Reads reject invalid persisted state instead of masking it.

pub mod interval_repo;
