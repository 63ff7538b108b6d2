//! Event dispatcher that records every notification

use parking_lot::Mutex;
use persona_core::{EventDispatcher, ProxyId, RoleEvent, RoleEventKind};

#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<(RoleEventKind, RoleEvent)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything fired so far, oldest first
    pub fn events(&self) -> Vec<(RoleEventKind, RoleEvent)> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<RoleEventKind> {
        self.events.lock().iter().map(|(kind, _)| *kind).collect()
    }

    /// Events fired for one identity
    pub fn events_for(&self, identity: ProxyId) -> Vec<RoleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(_, event)| event.identity == identity)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn fire(&self, _identity: ProxyId, kind: RoleEventKind, payload: &RoleEvent) -> usize {
        self.events.lock().push((kind, payload.clone()));
        1
    }
}
