//! Runtime class descriptors for proxy handles
//!
//! Persona does not generate code. A handle's "runtime type" is a
//! [`ProxyClass`]: an immutable descriptor chained to its parent. The root of
//! every chain is an application-declared base class carrying the field
//! layout. Each composition stacks a role layer (declaring one contract and
//! a forwarder per contract operation) or a marker layer on top.
//!
//! Class names are unique within a process, so class identity is name
//! identity.

use crate::errors::ProxyError;
use crate::proxy::ExtendedState;
use crate::role::{Role, RoleContract, VisibilityMarker};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Factory producing a fresh extended-state value for a new instance
pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn ExtendedState> + Send + Sync>;

/// Key under which a role instance is bound inside a handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey(String);

impl BindingKey {
    /// Key for the role fulfilling `contract`
    pub fn for_contract(contract: &str) -> Self {
        Self(format!("role.{contract}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delegating body for one contract operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarder {
    pub contract: String,
    pub operation: String,
    pub arity: usize,
    pub key: BindingKey,
}

impl Forwarder {
    /// Call the bound role with the caller's arguments, returning its result unchanged
    pub fn forward(&self, role: &dyn Role, args: &[Value]) -> Result<Value, ProxyError> {
        if args.len() != self.arity {
            return Err(ProxyError::ArityMismatch {
                operation: self.operation.clone(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        role.invoke(&self.operation, args).map_err(ProxyError::Role)
    }
}

/// What a class level contributes
#[derive(Clone)]
pub enum ClassLayer {
    /// Application-declared root
    Base {
        fields: IndexMap<String, Value>,
        contracts: Vec<String>,
        extension: Option<ExtensionFactory>,
    },
    /// Synthesized layer exposing one role contract
    Role {
        contract: Arc<RoleContract>,
        key: BindingKey,
    },
    /// Synthesized layer carrying one visibility marker
    Marker { marker: VisibilityMarker },
}

impl fmt::Debug for ClassLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base {
                fields, contracts, ..
            } => f
                .debug_struct("Base")
                .field("fields", &fields.keys().collect::<Vec<_>>())
                .field("contracts", contracts)
                .finish(),
            Self::Role { contract, key } => f
                .debug_struct("Role")
                .field("contract", &contract.name())
                .field("key", key)
                .finish(),
            Self::Marker { marker } => f.debug_struct("Marker").field("marker", marker).finish(),
        }
    }
}

/// Runtime type of a proxy handle
#[derive(Debug)]
pub struct ProxyClass {
    name: String,
    parent: Option<Arc<ProxyClass>>,
    layer: ClassLayer,
    forwarders: IndexMap<String, Forwarder>,
}

impl ProxyClass {
    /// Start declaring a base class
    pub fn base(name: impl Into<String>) -> BaseClassBuilder {
        BaseClassBuilder {
            name: name.into(),
            fields: IndexMap::new(),
            contracts: Vec::new(),
            extension: None,
        }
    }

    /// Role layer over `parent`
    pub fn role_layer(
        name: impl Into<String>,
        parent: Arc<ProxyClass>,
        contract: Arc<RoleContract>,
        key: BindingKey,
        forwarders: IndexMap<String, Forwarder>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(parent),
            layer: ClassLayer::Role { contract, key },
            forwarders,
        })
    }

    /// Marker layer over `parent`
    pub fn marker_layer(
        name: impl Into<String>,
        parent: Arc<ProxyClass>,
        marker: VisibilityMarker,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(parent),
            layer: ClassLayer::Marker { marker },
            forwarders: IndexMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ProxyClass>> {
        self.parent.as_ref()
    }

    pub fn layer(&self) -> &ClassLayer {
        &self.layer
    }

    pub fn forwarders(&self) -> &IndexMap<String, Forwarder> {
        &self.forwarders
    }

    pub fn is_base(&self) -> bool {
        matches!(self.layer, ClassLayer::Base { .. })
    }

    /// Contracts and markers declared directly at this level
    pub fn declared_interfaces(&self) -> Vec<&str> {
        match &self.layer {
            ClassLayer::Base { contracts, .. } => contracts.iter().map(String::as_str).collect(),
            ClassLayer::Role { contract, .. } => vec![contract.name()],
            ClassLayer::Marker { marker } => vec![marker.name()],
        }
    }

    /// Whether this level itself declares `contract`
    pub fn declares_contract(&self, contract: &str) -> bool {
        match &self.layer {
            ClassLayer::Base { contracts, .. } => contracts.iter().any(|c| c == contract),
            ClassLayer::Role { contract: c, .. } => c.name() == contract,
            ClassLayer::Marker { .. } => false,
        }
    }

    /// Whether this level itself carries `marker`
    pub fn declares_marker(&self, marker: &str) -> bool {
        matches!(&self.layer, ClassLayer::Marker { marker: m } if m.name() == marker)
    }

    /// This class followed by each ancestor up to the base
    pub fn ancestry(self: &Arc<Self>) -> Ancestry {
        Ancestry {
            next: Some(Arc::clone(self)),
        }
    }

    /// Whether this class or any ancestor declares `contract`
    pub fn implements(self: &Arc<Self>, contract: &str) -> bool {
        self.ancestry().any(|class| class.declares_contract(contract))
    }

    /// Whether this class or any ancestor carries `marker`
    pub fn has_marker(self: &Arc<Self>, marker: &str) -> bool {
        self.ancestry().any(|class| class.declares_marker(marker))
    }

    /// Root base class of the chain
    pub fn root(self: &Arc<Self>) -> Arc<ProxyClass> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        current
    }

    /// Number of layers stacked above the base
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_ref();
        while let Some(class) = current {
            depth += 1;
            current = class.parent.as_ref();
        }
        depth
    }

    /// Field layout declared by the base, in declaration order
    pub fn field_layout(self: &Arc<Self>) -> IndexMap<String, Value> {
        match &self.root().layer {
            ClassLayer::Base { fields, .. } => fields.clone(),
            _ => IndexMap::new(),
        }
    }

    pub fn extension_factory(self: &Arc<Self>) -> Option<ExtensionFactory> {
        match &self.root().layer {
            ClassLayer::Base { extension, .. } => extension.clone(),
            _ => None,
        }
    }

    /// Most-derived forwarder for `operation`
    pub fn find_forwarder(self: &Arc<Self>, operation: &str) -> Option<Forwarder> {
        self.ancestry()
            .find_map(|class| class.forwarders.get(operation).cloned())
    }

    /// Binding keys any level of this chain forwards through
    pub fn referenced_keys(self: &Arc<Self>) -> HashSet<BindingKey> {
        self.ancestry()
            .filter_map(|class| match &class.layer {
                ClassLayer::Role { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether `self` is `other` or derives from it
    pub fn is_subclass_of(self: &Arc<Self>, other: &ProxyClass) -> bool {
        self.ancestry().any(|class| class.name == other.name)
    }
}

impl PartialEq for ProxyClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ProxyClass {}

impl fmt::Display for ProxyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Iterator over a class and its ancestors, most-derived first
pub struct Ancestry {
    next: Option<Arc<ProxyClass>>,
}

impl Iterator for Ancestry {
    type Item = Arc<ProxyClass>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent.clone();
        Some(current)
    }
}

/// Builder for application base classes
pub struct BaseClassBuilder {
    name: String,
    fields: IndexMap<String, Value>,
    contracts: Vec<String>,
    extension: Option<ExtensionFactory>,
}

impl BaseClassBuilder {
    /// Declare a field with its default value
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), default.into());
        self
    }

    /// Declare a contract the base structurally conforms to
    pub fn contract(mut self, name: impl Into<String>) -> Self {
        self.contracts.push(name.into());
        self
    }

    /// Give instances an extended state produced by `factory`
    pub fn extension<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExtendedState> + Send + Sync + 'static,
    {
        self.extension = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Arc<ProxyClass> {
        Arc::new(ProxyClass {
            name: self.name,
            parent: None,
            layer: ClassLayer::Base {
                fields: self.fields,
                contracts: self.contracts,
                extension: self.extension,
            },
            forwarders: IndexMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::OperationSignature;

    fn admin_contract() -> Arc<RoleContract> {
        Arc::new(RoleContract::new("IAdmin").operation(OperationSignature::new("createDatabase")))
    }

    #[test]
    fn test_ancestry_walks_to_base() {
        let base = ProxyClass::base("DBProxy").field("property1", 0).build();
        let key = BindingKey::for_contract("IAdmin");
        let role = ProxyClass::role_layer(
            "DBProxy_roled_1_1",
            base.clone(),
            admin_contract(),
            key.clone(),
            IndexMap::new(),
        );
        let marked = ProxyClass::marker_layer(
            "DBProxy_roled_1_1_roled_2_1",
            role.clone(),
            VisibilityMarker::new("Audited"),
        );

        let names: Vec<String> = marked.ancestry().map(|c| c.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["DBProxy_roled_1_1_roled_2_1", "DBProxy_roled_1_1", "DBProxy"]
        );
        assert_eq!(marked.depth(), 2);
        assert_eq!(*marked.root(), *base);
        assert!(marked.implements("IAdmin"));
        assert!(marked.has_marker("Audited"));
        assert!(!base.implements("IAdmin"));
        assert!(marked.referenced_keys().contains(&key));
        assert!(marked.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&role));
        assert_eq!(marked.field_layout().len(), 1);
    }

    #[test]
    fn test_declared_interfaces_per_layer() {
        let base = ProxyClass::base("Plain")
            .contract("Closeable")
            .contract("Named")
            .build();
        assert_eq!(base.declared_interfaces(), vec!["Closeable", "Named"]);
        assert!(base.declares_contract("Named"));

        let marker = ProxyClass::marker_layer("Plain_m", base, VisibilityMarker::new("Hidden"));
        assert_eq!(marker.declared_interfaces(), vec!["Hidden"]);
        assert!(!marker.declares_contract("Hidden"));
        assert!(marker.declares_marker("Hidden"));
    }

    #[test]
    fn test_binding_key_for_contract() {
        assert_eq!(BindingKey::for_contract("IAdmin").as_str(), "role.IAdmin");
    }
}
