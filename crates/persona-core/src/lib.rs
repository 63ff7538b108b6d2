//! Persona Core - handles, identities and role contracts
//!
//! Foundation types shared by the composition engine and the proxy
//! coordinator:
//!
//! - [`ProxyId`]: process-wide identity that survives every composition
//! - [`Proxy`]: identity-bearing handle whose runtime class can change
//! - [`ProxyClass`]: runtime class descriptor, a base plus stacked role and marker layers
//! - [`Role`], [`RoleContract`], [`VisibilityMarker`]: what can be attached
//! - [`EventDispatcher`]: notification boundary for role assumption/release
//! - [`PersonaConfig`]: TOML + environment configuration

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod class;
pub mod config;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod injection;
pub mod proxy;
pub mod role;

pub use class::{Ancestry, BaseClassBuilder, BindingKey, ClassLayer, Forwarder, ProxyClass};
pub use config::{CoordinatorConfig, EngineConfig, PersonaConfig};
pub use errors::{ConfigError, ProxyError, RoleError};
pub use events::{
    CompositionOutcome, EventDispatcher, ListenerDispatcher, RoleEvent, RoleEventKind,
    RoleEventListener,
};
pub use identifiers::{AgentId, EngineId, ProxyId};
pub use injection::InjectionKind;
pub use proxy::{ExtendedState, FieldMap, Proxy, ProxyResolver, SharedProxy};
pub use role::{
    OperationSignature, ParameterDescriptor, Role, RoleContract, RoleDescriptor, TaskDescriptor,
    ValueKind, VisibilityMarker,
};
