//! Persona - runtime roles for identity-bearing handles
//!
//! Attach a capability ("role") to a live handle without disturbing the code
//! that holds it. Every role change produces a new version of the handle with
//! the same identity; the coordinator hands out the newest version and holds
//! readers off while a change is in flight.
//!
//! ```rust,ignore
//! use persona::{AgentId, PersonaConfig, Proxy, RoleDirector};
//!
//! let director = RoleDirector::new(PersonaConfig::default());
//! let id = director.register(Proxy::shared(&db_proxy));
//! let admin = director.assume_role(AgentId::new(), id, admin_role.clone())?;
//! admin.invoke("createDatabase", &[json!("orders")])?;
//! director.release_until(AgentId::new(), id, admin_role)?;
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod director;

pub use director::{DirectorError, RoleDirector};

pub use persona_composition::{
    ClassRegistry, CompositionCause, CompositionEngine, CompositionError, CompositionOperation,
    DelegatingForwarders, ForwarderGenerator, OperationError, OperationStatus, TransferError,
    TransferHandler,
};
pub use persona_coordination::{CoordinatorStats, ProxyCoordinator};
pub use persona_core::{
    AgentId, EngineConfig, EventDispatcher, ExtendedState, InjectionKind, ListenerDispatcher,
    PersonaConfig, Proxy, ProxyClass, ProxyError, ProxyId, Role, RoleContract, RoleError,
    RoleEvent, RoleEventKind, RoleEventListener, SharedProxy, VisibilityMarker,
};
