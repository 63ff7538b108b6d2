//! Forwarder generation for role layers
//!
//! A synthesized role layer exposes every operation of its contract through a
//! [`Forwarder`] that looks up the bound role under a binding key and calls
//! it. Generators are pluggable per operation so callers can wrap or filter
//! the default delegation.

use crate::errors::CompositionCause;
use indexmap::IndexMap;
use persona_core::{BindingKey, Forwarder, RoleContract};
use std::sync::Arc;

/// Produces the forwarders of one role layer
pub trait ForwarderGenerator: Send {
    /// Select the contract and the binding key the forwarders delegate through
    fn prepare(&mut self, contract: &Arc<RoleContract>, key: &BindingKey);

    /// Forwarders for the prepared contract, keyed by operation name
    fn generate(&mut self) -> Result<IndexMap<String, Forwarder>, CompositionCause>;
}

/// Default generator: one delegating forwarder per contract operation
#[derive(Debug, Default)]
pub struct DelegatingForwarders {
    prepared: Option<(Arc<RoleContract>, BindingKey)>,
}

impl DelegatingForwarders {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForwarderGenerator for DelegatingForwarders {
    fn prepare(&mut self, contract: &Arc<RoleContract>, key: &BindingKey) {
        self.prepared = Some((Arc::clone(contract), key.clone()));
    }

    fn generate(&mut self) -> Result<IndexMap<String, Forwarder>, CompositionCause> {
        let (contract, key) = self
            .prepared
            .as_ref()
            .ok_or(CompositionCause::ForwardersNotPrepared)?;

        let mut forwarders = IndexMap::with_capacity(contract.operations().len());
        for signature in contract.operations() {
            let forwarder = Forwarder {
                contract: contract.name().to_string(),
                operation: signature.name().to_string(),
                arity: signature.arity(),
                key: key.clone(),
            };
            if forwarders
                .insert(signature.name().to_string(), forwarder)
                .is_some()
            {
                return Err(CompositionCause::DuplicateOperation {
                    contract: contract.name().to_string(),
                    operation: signature.name().to_string(),
                });
            }
        }
        Ok(forwarders)
    }
}
