//! Role assumption and release notifications
//!
//! The composition engine reports every terminal composition to an
//! [`EventDispatcher`]. Dispatch is fire-and-count: the caller learns how many
//! listeners were notified and never waits on them beyond the synchronous
//! callback.

use crate::identifiers::{AgentId, ProxyId};
use crate::injection::InjectionKind;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Category of a role notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleEventKind {
    RoleAssumed,
    RoleReleased,
    CompositionFailed,
}

/// Terminal result of a composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositionOutcome {
    Success,
    Failure { reason: String },
}

/// Payload delivered with every role notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEvent {
    pub identity: ProxyId,
    pub agent: AgentId,
    pub injection: InjectionKind,
    pub role: String,
    pub outcome: CompositionOutcome,
    /// Runtime class of the resulting handle, when the composition succeeded
    pub class_name: Option<String>,
}

impl RoleEvent {
    /// Kind this payload is announced under
    pub fn kind(&self) -> RoleEventKind {
        match (&self.outcome, self.injection.is_addition()) {
            (CompositionOutcome::Failure { .. }, _) => RoleEventKind::CompositionFailed,
            (CompositionOutcome::Success, true) => RoleEventKind::RoleAssumed,
            (CompositionOutcome::Success, false) => RoleEventKind::RoleReleased,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == CompositionOutcome::Success
    }
}

/// Publish side of the notifier
pub trait EventDispatcher: Send + Sync {
    /// Announce `payload` for `identity`, returning how many listeners saw it
    fn fire(&self, identity: ProxyId, kind: RoleEventKind, payload: &RoleEvent) -> usize;
}

/// Subscriber side of the notifier
pub trait RoleEventListener: Send + Sync {
    fn on_event(&self, kind: RoleEventKind, event: &RoleEvent);
}

struct Subscription {
    identity: Option<ProxyId>,
    listener: Arc<dyn RoleEventListener>,
}

/// In-process dispatcher fanning events out to registered listeners
#[derive(Default)]
pub struct ListenerDispatcher {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl ListenerDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive events for every identity
    pub fn subscribe(&self, listener: Arc<dyn RoleEventListener>) {
        self.subscriptions.write().push(Subscription {
            identity: None,
            listener,
        });
    }

    /// Receive events for one identity only
    pub fn subscribe_to(&self, identity: ProxyId, listener: Arc<dyn RoleEventListener>) {
        self.subscriptions.write().push(Subscription {
            identity: Some(identity),
            listener,
        });
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl EventDispatcher for ListenerDispatcher {
    fn fire(&self, identity: ProxyId, kind: RoleEventKind, payload: &RoleEvent) -> usize {
        // Snapshot so listeners may subscribe from inside a callback
        let targets: Vec<Arc<dyn RoleEventListener>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.identity.map_or(true, |id| id == identity))
            .map(|s| Arc::clone(&s.listener))
            .collect();
        for listener in &targets {
            listener.on_event(kind, payload);
        }
        trace!(proxy = %identity, ?kind, notified = targets.len(), "role event dispatched");
        targets.len()
    }
}

impl fmt::Debug for ListenerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
