//! Role assumption on registered identities
//!
//! [`RoleDirector`] pairs a composition engine with a proxy coordinator.
//! Each role change reads the identity's current version, locks it so other
//! readers wait, composes, stores the result and unlocks again, whatever the
//! outcome. Changes to one identity run one at a time: a second writer waits
//! for the first and then composes on the version it stored.

use persona_composition::{CompositionEngine, CompositionError};
use persona_coordination::ProxyCoordinator;
use parking_lot::Mutex;
use persona_core::{AgentId, EventDispatcher, PersonaConfig, ProxyId, Role, SharedProxy};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error returned by [`RoleDirector`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectorError {
    /// The identity was never registered, or has been deregistered
    #[error("Identity {id} is not registered")]
    UnknownIdentity { id: ProxyId },

    #[error(transparent)]
    Composition(#[from] CompositionError),
}

/// Assumes and releases roles on identities tracked by a coordinator
pub struct RoleDirector {
    engine: CompositionEngine,
    coordinator: Arc<ProxyCoordinator>,
    writers: Mutex<HashMap<ProxyId, Arc<Mutex<()>>>>,
}

impl RoleDirector {
    /// Build an engine and a coordinator from `config`
    pub fn new(config: PersonaConfig) -> Self {
        Self::with_parts(
            CompositionEngine::new(config.engine),
            Arc::new(ProxyCoordinator::new(config.coordinator)),
        )
    }

    pub fn with_parts(engine: CompositionEngine, coordinator: Arc<ProxyCoordinator>) -> Self {
        Self {
            engine,
            coordinator,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Announce role changes through `dispatcher`
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.engine = self.engine.with_dispatcher(dispatcher);
        self
    }

    pub fn engine(&self) -> &CompositionEngine {
        &self.engine
    }

    pub fn coordinator(&self) -> &Arc<ProxyCoordinator> {
        &self.coordinator
    }

    /// Start tracking `handle` as the current version of its identity
    pub fn register(&self, handle: SharedProxy) -> ProxyId {
        let id = handle.id();
        self.coordinator.store(handle);
        id
    }

    pub fn deregister(&self, id: ProxyId) -> Option<SharedProxy> {
        self.writers.lock().remove(&id);
        self.coordinator.delete(id)
    }

    /// Current version of `id`, waiting for any composition in flight
    pub fn current(&self, id: ProxyId) -> Option<SharedProxy> {
        self.coordinator.current_of(id)
    }

    pub fn assume_role(
        &self,
        agent: AgentId,
        id: ProxyId,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, DirectorError> {
        self.bracket(id, |current| self.engine.compose_add(agent, current, role))
    }

    /// Drop one role, keeping every role and marker attached after it
    pub fn release_role(
        &self,
        agent: AgentId,
        id: ProxyId,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, DirectorError> {
        self.bracket(id, |current| self.engine.compose_remove(agent, current, role))
    }

    /// Drop a role together with everything attached after it
    pub fn release_until(
        &self,
        agent: AgentId,
        id: ProxyId,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, DirectorError> {
        self.bracket(id, |current| self.engine.remove_until(agent, current, role))
    }

    pub fn show_marker(
        &self,
        agent: AgentId,
        id: ProxyId,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, DirectorError> {
        self.bracket(id, |current| self.engine.add_marker(agent, current, role))
    }

    pub fn hide_marker(
        &self,
        agent: AgentId,
        id: ProxyId,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, DirectorError> {
        self.bracket(id, |current| self.engine.remove_marker(agent, current, role))
    }

    fn bracket<F>(&self, id: ProxyId, compose: F) -> Result<SharedProxy, DirectorError>
    where
        F: FnOnce(&SharedProxy) -> Result<SharedProxy, CompositionError>,
    {
        let writer = self.writer(id);
        let _serialized = writer.lock();
        let current = self
            .coordinator
            .current_of(id)
            .ok_or(DirectorError::UnknownIdentity { id })?;
        self.coordinator.lock(&current, false, None);
        let result = compose(&current);
        if let Ok(next) = &result {
            self.coordinator.store(Arc::clone(next));
            debug!(proxy = %id, class = next.class_name(), "current version advanced");
        }
        self.coordinator.unlock(id, false);
        Ok(result?)
    }

    fn writer(&self, id: ProxyId) -> Arc<Mutex<()>> {
        Arc::clone(self.writers.lock().entry(id).or_default())
    }
}
