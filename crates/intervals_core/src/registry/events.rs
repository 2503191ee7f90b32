//! Change notifications published by the registry.

use crate::error::EngineWarning;
use crate::lifecycle::StatusChange;
use crate::model::interval::IntervalId;
use std::sync::mpsc::{self, Receiver, Sender};

/// One observable registry change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(IntervalId),
    Updated(IntervalId),
    Removed(IntervalId),
    StatusChanged(StatusChange),
    Warning(EngineWarning),
}

/// Fan-out of registry events to channel subscribers.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl EventHub {
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Sends `event` to every live subscriber and prunes dropped receivers.
    pub fn publish(&mut self, event: RegistryEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
