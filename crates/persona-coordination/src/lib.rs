//! Persona Coordination - current-version registry for proxy handles
//!
//! [`ProxyCoordinator`] maps each identity to the handle that currently
//! represents it. Compositions are bracketed by [`ProxyCoordinator::lock`] and
//! [`ProxyCoordinator::unlock`]; [`ProxyCoordinator::current_of`] blocks while
//! a composition is in flight, except for the thread running it.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod coordinator;
pub mod status;

pub use coordinator::ProxyCoordinator;
pub use status::{CoordinatorStats, ProxyStatus};
