//! Interval registry: the single coordination context.
//!
//! # Responsibility
//! - Expose add/update/remove/complete/tick to UI and CLI callers.
//! - Publish change events for observers.

pub mod events;
pub mod interval_registry;

pub use events::RegistryEvent;
pub use interval_registry::IntervalRegistry;
