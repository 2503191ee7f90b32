//! Flutter-facing bindings for the interval engine.

pub mod api;
