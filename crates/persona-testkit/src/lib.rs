//! Persona Testing Infrastructure
//!
//! Shared fixtures for the workspace's unit and integration tests: a
//! `DBProxy` handle class, roles with inspectable side effects, and an
//! event dispatcher that records what it is given.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! persona-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use persona_testkit::*;
//! use persona_core::Proxy;
//!
//! let handle = Proxy::shared(&db_proxy_class());
//! let admin = std::sync::Arc::new(AdminRole::new());
//! ```

pub mod classes;
pub mod events;
pub mod roles;

pub use classes::*;
pub use events::*;
pub use roles::*;

/// Install a fmt subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
