//! Persona Composition - runtime role composition for proxy handles
//!
//! Attaches and detaches roles on identity-bearing handles by deriving a new
//! runtime class per composition and moving the handle's state into a fresh
//! instance of it:
//!
//! - [`CompositionEngine`]: the four compositions and their naming discipline
//! - [`CompositionOperation`]: parameters and status of one attempt
//! - [`TransferHandler`]: single-use state transfer between instances
//! - [`ForwarderGenerator`]: per-operation delegation for role layers
//! - [`ClassRegistry`]: name-keyed cache of synthesized classes
//!
//! # Example
//!
//! ```rust,ignore
//! use persona_composition::CompositionEngine;
//!
//! let engine = CompositionEngine::default();
//! let admin_handle = engine.compose_add(agent, &handle, admin_role.clone())?;
//! admin_handle.invoke("createDatabase", &[json!("orders")])?;
//! let plain = engine.remove_until(agent, &admin_handle, admin_role)?;
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod engine;
pub mod errors;
pub mod forwarder;
pub mod hierarchy;
pub mod naming;
pub mod operation;
pub mod registry;
pub mod transfer;

pub use engine::CompositionEngine;
pub use errors::{
    CompositionCause, CompositionError, OperationError, ProtocolViolation, TransferError,
};
pub use forwarder::{DelegatingForwarders, ForwarderGenerator};
pub use hierarchy::{remove_until_target, split_at, LayerSplit};
pub use naming::{
    format_class_name, parse_class_name, root_class_name, ClassNamer, NameReservation,
    SynthesizedName,
};
pub use operation::{CompositionOperation, OperationStatus, RemovalScope};
pub use registry::ClassRegistry;
pub use transfer::TransferHandler;
