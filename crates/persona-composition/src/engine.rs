//! Composition engine
//!
//! The engine derives a new runtime class for a handle, instantiates it and
//! moves the handle's state across, producing the next version of the same
//! identity. Four compositions are supported:
//!
//! - **Add a role**: stack a role layer exposing the role's contract, with
//!   one forwarder per operation, and bind the role instance under the
//!   contract's key.
//! - **Remove a role**: drop the layer declaring the contract and re-stack
//!   every layer that sat above it, in order.
//! - **Remove until**: fall back to the nearest ancestor class that no longer
//!   implements the contract, discarding everything stacked above it.
//! - **Show/hide a marker**: the same shapes with contract-free marker layers.
//!
//! Synthesis for one engine is serialized by the engine's naming lock.
//! Classes are registered, and their counter values consumed, only once the
//! whole composition has succeeded. The engine never touches coordinator
//! locks; callers bracket compositions themselves when readers must be held
//! off.

use crate::errors::{CompositionCause, CompositionError};
use crate::hierarchy::{remove_until_target, split_at, LayerSplit};
use crate::naming::{ClassNamer, NameReservation};
use crate::operation::{CompositionOperation, RemovalScope};
use crate::registry::ClassRegistry;
use persona_core::{
    AgentId, BindingKey, ClassLayer, CompositionOutcome, EngineConfig, EngineId, EventDispatcher,
    InjectionKind, Proxy, ProxyClass, Role, RoleContract, RoleEvent, SharedProxy,
    VisibilityMarker,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Class a composition resolves to, plus the classes synthesized on the way
struct Plan {
    class: Arc<ProxyClass>,
    synthesized: Vec<Arc<ProxyClass>>,
}

impl Plan {
    fn existing(class: Arc<ProxyClass>) -> Self {
        Self {
            class,
            synthesized: Vec::new(),
        }
    }
}

/// Derives role-augmented versions of proxy handles
pub struct CompositionEngine {
    id: EngineId,
    config: EngineConfig,
    names: ClassNamer,
    registry: Arc<ClassRegistry>,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
}

impl CompositionEngine {
    /// Create an engine with its own class registry and no event dispatcher
    pub fn new(config: EngineConfig) -> Self {
        let id = config
            .instance_id
            .map(EngineId::from_raw)
            .unwrap_or_else(EngineId::allocate);
        debug!(engine = %id, strict_remove_until = config.strict_remove_until, "composition engine created");
        Self {
            id,
            config,
            names: ClassNamer::new(id),
            registry: Arc::new(ClassRegistry::new()),
            dispatcher: None,
        }
    }

    /// Announce every terminal composition through `dispatcher`
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Share a class registry with other engines
    pub fn with_registry(mut self, registry: Arc<ClassRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Number of classes this engine has synthesized
    pub fn manipulations(&self) -> u64 {
        self.names.peek() - 1
    }

    /// Attach `role`'s contract to `handle`
    pub fn compose_add(
        &self,
        agent: AgentId,
        handle: &SharedProxy,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, CompositionError> {
        let mut op =
            CompositionOperation::new(InjectionKind::AddPublicRole, Arc::clone(handle), role);
        self.compose(agent, &mut op)
    }

    /// Detach `role`'s contract from `handle`, keeping every other layer
    pub fn compose_remove(
        &self,
        agent: AgentId,
        handle: &SharedProxy,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, CompositionError> {
        let mut op =
            CompositionOperation::new(InjectionKind::RemovePublicRole, Arc::clone(handle), role);
        self.compose(agent, &mut op)
    }

    /// Fall back to the nearest ancestor class without `role`'s contract
    pub fn remove_until(
        &self,
        agent: AgentId,
        handle: &SharedProxy,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, CompositionError> {
        let mut op = CompositionOperation::remove_until(Arc::clone(handle), role);
        self.compose(agent, &mut op)
    }

    /// Attach `role`'s visibility marker to `handle`
    pub fn add_marker(
        &self,
        agent: AgentId,
        handle: &SharedProxy,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, CompositionError> {
        let mut op = CompositionOperation::new(
            InjectionKind::AddVisibleRoleMarker,
            Arc::clone(handle),
            role,
        );
        self.compose(agent, &mut op)
    }

    /// Detach `role`'s visibility marker from `handle`, keeping every other layer
    pub fn remove_marker(
        &self,
        agent: AgentId,
        handle: &SharedProxy,
        role: Arc<dyn Role>,
    ) -> Result<SharedProxy, CompositionError> {
        let mut op = CompositionOperation::new(
            InjectionKind::RemoveVisibleRoleMarker,
            Arc::clone(handle),
            role,
        );
        self.compose(agent, &mut op)
    }

    /// Drive a queued operation to completion
    ///
    /// The operation ends in `COMPLETED_SUCCESS` with the new class name, or
    /// in `COMPLETED_FAILURE` with the cause that is also returned.
    pub fn compose(
        &self,
        agent: AgentId,
        op: &mut CompositionOperation,
    ) -> Result<SharedProxy, CompositionError> {
        op.start()?;
        let proxy = op.target().id();
        debug!(
            engine = %self.id,
            proxy = %proxy,
            kind = %op.kind(),
            role = op.role().name(),
            class = op.target().class_name(),
            "composition started"
        );

        match self.attempt(op) {
            Ok(next) => {
                op.succeed(next.class_name());
                info!(
                    engine = %self.id,
                    proxy = %proxy,
                    kind = %op.kind(),
                    from = op.target().class_name(),
                    to = next.class_name(),
                    "composition succeeded"
                );
                self.announce(agent, op);
                Ok(next)
            }
            Err(cause) => {
                warn!(
                    engine = %self.id,
                    proxy = %proxy,
                    kind = %op.kind(),
                    role = op.role().name(),
                    error = %cause,
                    "composition failed"
                );
                op.fail(cause.clone());
                self.announce(agent, op);
                Err(CompositionError::Failed {
                    proxy,
                    kind: op.kind(),
                    role: op.role().name().to_string(),
                    cause,
                })
            }
        }
    }

    fn attempt(&self, op: &mut CompositionOperation) -> Result<SharedProxy, CompositionCause> {
        let mut names = self.names.reserve();
        let plan = self.plan(op, &mut names)?;
        let next = Self::populate(op, &plan.class)?;
        self.registry.register_all(&plan.synthesized)?;
        let consumed = names.commit();
        if consumed > 0 {
            debug!(engine = %self.id, consumed, class = plan.class.name(), "class names committed");
        }
        Ok(Arc::new(next))
    }

    fn plan(
        &self,
        op: &mut CompositionOperation,
        names: &mut NameReservation<'_>,
    ) -> Result<Plan, CompositionCause> {
        let current = Arc::clone(op.target().class());
        match op.kind() {
            InjectionKind::AddPublicRole => {
                let contract = Self::require_contract(op)?;
                if current.implements(contract.name()) {
                    return Err(CompositionCause::ContractAlreadyPresent {
                        class: current.name().to_string(),
                        contract: contract.name().to_string(),
                    });
                }
                let key = BindingKey::for_contract(contract.name());
                let class = Self::stack_role(op, names, current, &contract, &key)?;
                Ok(Plan {
                    class: Arc::clone(&class),
                    synthesized: vec![class],
                })
            }
            InjectionKind::RemovePublicRole => {
                let contract = Self::require_contract(op)?;
                let not_found = || CompositionCause::AncestryNotFound {
                    class: current.name().to_string(),
                    target: contract.name().to_string(),
                };
                match op.scope() {
                    RemovalScope::Layer => {
                        let split = split_at(&current, |c| c.declares_contract(contract.name()))
                            .ok_or_else(not_found)?;
                        Self::restack(op, names, split)
                    }
                    RemovalScope::Until => remove_until_target(
                        &current,
                        contract.name(),
                        self.config.strict_remove_until,
                    )
                    .map(Plan::existing)
                    .ok_or_else(not_found),
                }
            }
            InjectionKind::AddVisibleRoleMarker => {
                let marker = Self::require_marker(op)?;
                if current.has_marker(marker.name()) {
                    return Err(CompositionCause::MarkerAlreadyPresent {
                        class: current.name().to_string(),
                        marker: marker.name().to_string(),
                    });
                }
                let name = names.next_name(current.name());
                let class = ProxyClass::marker_layer(name, current, marker);
                Ok(Plan {
                    class: Arc::clone(&class),
                    synthesized: vec![class],
                })
            }
            InjectionKind::RemoveVisibleRoleMarker => {
                let marker = Self::require_marker(op)?;
                let split = split_at(&current, |c| c.declares_marker(marker.name())).ok_or_else(
                    || CompositionCause::AncestryNotFound {
                        class: current.name().to_string(),
                        target: marker.name().to_string(),
                    },
                )?;
                Self::restack(op, names, split)
            }
        }
    }

    /// Rebuild the layers that sat above a removed one on the removed layer's parent
    fn restack(
        op: &mut CompositionOperation,
        names: &mut NameReservation<'_>,
        split: LayerSplit,
    ) -> Result<Plan, CompositionCause> {
        let LayerSplit { base, retained, .. } = split;
        let mut class = base;
        let mut synthesized = Vec::with_capacity(retained.len());
        for layer in &retained {
            class = match layer.layer() {
                ClassLayer::Role { contract, key } => {
                    Self::stack_role(op, names, class, contract, key)?
                }
                ClassLayer::Marker { marker } => {
                    let name = names.next_name(class.name());
                    ProxyClass::marker_layer(name, class, marker.clone())
                }
                ClassLayer::Base { .. } => continue,
            };
            synthesized.push(Arc::clone(&class));
        }
        Ok(Plan { class, synthesized })
    }

    fn stack_role(
        op: &mut CompositionOperation,
        names: &mut NameReservation<'_>,
        parent: Arc<ProxyClass>,
        contract: &Arc<RoleContract>,
        key: &BindingKey,
    ) -> Result<Arc<ProxyClass>, CompositionCause> {
        let generator = op.forwarders_mut();
        generator.prepare(contract, key);
        let forwarders = generator.generate()?;
        let name = names.next_name(parent.name());
        Ok(ProxyClass::role_layer(
            name,
            parent,
            Arc::clone(contract),
            key.clone(),
            forwarders,
        ))
    }

    /// Instantiate `class` and move the target's state into it
    fn populate(
        op: &mut CompositionOperation,
        class: &Arc<ProxyClass>,
    ) -> Result<Proxy, CompositionCause> {
        let mut destination = Proxy::instantiate(class);
        if op.kind() == InjectionKind::AddPublicRole {
            if let Some(contract) = op.contract() {
                destination.bind(BindingKey::for_contract(contract.name()), Arc::clone(op.role()));
            }
        }
        let source = Arc::clone(op.target());
        let transfer = op.transfer_mut();
        transfer.set_source(source)?;
        transfer.set_destination(destination)?;
        transfer.transfer()?;
        Ok(transfer.take_destination()?)
    }

    fn require_contract(op: &CompositionOperation) -> Result<Arc<RoleContract>, CompositionCause> {
        op.contract()
            .cloned()
            .ok_or_else(|| CompositionCause::MissingContract {
                role: op.role().name().to_string(),
            })
    }

    fn require_marker(op: &CompositionOperation) -> Result<VisibilityMarker, CompositionCause> {
        op.marker()
            .cloned()
            .ok_or_else(|| CompositionCause::MissingMarker {
                role: op.role().name().to_string(),
            })
    }

    fn announce(&self, agent: AgentId, op: &CompositionOperation) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        let outcome = match op.cause() {
            Some(cause) => CompositionOutcome::Failure {
                reason: cause.to_string(),
            },
            None => CompositionOutcome::Success,
        };
        let event = RoleEvent {
            identity: op.target().id(),
            agent,
            injection: op.kind(),
            role: op.role().name().to_string(),
            outcome,
            class_name: op.result_class().map(str::to_string),
        };
        let notified = dispatcher.fire(event.identity, event.kind(), &event);
        debug!(proxy = %event.identity, kind = ?event.kind(), notified, "role event fired");
    }
}

impl Default for CompositionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for CompositionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionEngine")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("manipulations", &self.manipulations())
            .field("registered", &self.registry.len())
            .field("dispatcher", &self.dispatcher.is_some())
            .finish()
    }
}
