//! Identity-bearing proxy handles
//!
//! A [`Proxy`] owns exactly one [`ProxyId`], an `Arc<ProxyClass>` naming its
//! runtime type, a field map laid out by the base class, and a key→role map
//! that forwarders consult at call time. Handles are shared as
//! [`SharedProxy`]; once shared, only field values and extended state can
//! change. Identity, class and bindings are fixed when a handle is built.

use crate::class::{BindingKey, ProxyClass};
use crate::errors::ProxyError;
use crate::identifiers::ProxyId;
use crate::role::Role;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handle shared between callers and the coordinator
pub type SharedProxy = Arc<Proxy>;

/// Field values keyed by field name, in layout order
pub type FieldMap = IndexMap<String, Value>;

/// Implementation-specific state beyond the declared field layout
///
/// When both the source and destination of a transfer carry extended state,
/// the transfer delegates to [`ExtendedState::copy_into`] for whatever the
/// field copy does not reach.
pub trait ExtendedState: Send + Sync + fmt::Debug + 'static {
    /// Copy this state into `destination`
    fn copy_into(&self, destination: &mut dyn ExtendedState) -> Result<(), ProxyError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Resolves an identity to the current version of its handle
pub trait ProxyResolver {
    fn resolve(&self, id: ProxyId) -> Option<SharedProxy>;
}

/// Proxy handle
pub struct Proxy {
    id: ProxyId,
    class: Arc<ProxyClass>,
    fields: RwLock<FieldMap>,
    bindings: HashMap<BindingKey, Arc<dyn Role>>,
    extended: Option<Mutex<Box<dyn ExtendedState>>>,
}

impl Proxy {
    /// Build a blank instance of `class` with a fresh identity
    ///
    /// Fields start at the base class defaults; extended state comes from
    /// the base class factory, if any.
    pub fn instantiate(class: &Arc<ProxyClass>) -> Self {
        Self {
            id: ProxyId::generate(),
            class: Arc::clone(class),
            fields: RwLock::new(class.field_layout()),
            bindings: HashMap::new(),
            extended: class.extension_factory().map(|factory| Mutex::new(factory())),
        }
    }

    /// Instantiate and share in one step
    pub fn shared(class: &Arc<ProxyClass>) -> SharedProxy {
        Arc::new(Self::instantiate(class))
    }

    pub fn id(&self) -> ProxyId {
        self.id
    }

    pub fn class(&self) -> &Arc<ProxyClass> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Whether the handle's class chain declares `contract`
    pub fn implements(&self, contract: &str) -> bool {
        self.class.implements(contract)
    }

    /// Whether the handle's class chain carries `marker`
    pub fn has_marker(&self, marker: &str) -> bool {
        self.class.has_marker(marker)
    }

    /// Whether the handle's runtime class is exactly `class`
    pub fn is_instance_of(&self, class: &ProxyClass) -> bool {
        *self.class == *class
    }

    /// Read a field value
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Overwrite a field value, returning the previous one
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<Value, ProxyError> {
        let mut fields = self.fields.write();
        match fields.get_mut(name) {
            Some(slot) => Ok(std::mem::replace(slot, value.into())),
            None => Err(ProxyError::UnknownField {
                class: self.class.name().to_string(),
                field: name.to_string(),
            }),
        }
    }

    /// Snapshot of all field values
    pub fn fields(&self) -> FieldMap {
        self.fields.read().clone()
    }

    /// Call a contract operation through the handle's forwarders
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value, ProxyError> {
        let forwarder =
            self.class
                .find_forwarder(operation)
                .ok_or_else(|| ProxyError::UnknownOperation {
                    class: self.class.name().to_string(),
                    operation: operation.to_string(),
                })?;
        let role = self
            .bindings
            .get(&forwarder.key)
            .ok_or_else(|| ProxyError::Unbound {
                proxy: self.id,
                key: forwarder.key.to_string(),
            })?;
        forwarder.forward(role.as_ref(), args)
    }

    /// Role bound under `key`
    pub fn bound_role(&self, key: &BindingKey) -> Option<Arc<dyn Role>> {
        self.bindings.get(key).cloned()
    }

    /// Typed access to the role fulfilling `contract`
    pub fn role<R: Role>(&self, contract: &str) -> Option<&R> {
        self.bindings
            .get(&BindingKey::for_contract(contract))
            .and_then(|role| role.as_any().downcast_ref::<R>())
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&BindingKey, &Arc<dyn Role>)> {
        self.bindings.iter()
    }

    /// Bind a role instance under `key`, replacing any previous binding
    pub fn bind(&mut self, key: BindingKey, role: Arc<dyn Role>) -> Option<Arc<dyn Role>> {
        self.bindings.insert(key, role)
    }

    /// Take over an existing identity
    ///
    /// Only possible before the handle is shared.
    pub fn adopt_identity(&mut self, id: ProxyId) {
        self.id = id;
    }

    pub fn fields_mut(&mut self) -> &mut FieldMap {
        self.fields.get_mut()
    }

    pub fn has_extended_state(&self) -> bool {
        self.extended.is_some()
    }

    /// Run `f` against the extended state, if present
    pub fn with_extended<R>(&self, f: impl FnOnce(&mut dyn ExtendedState) -> R) -> Option<R> {
        self.extended.as_ref().map(|state| {
            let mut guard = state.lock();
            f(guard.as_mut())
        })
    }

    /// Replace the extended state wholesale
    pub fn replace_extended(&mut self, state: Box<dyn ExtendedState>) {
        self.extended = Some(Mutex::new(state));
    }

    /// Current version of this handle according to `resolver`
    pub fn latest(&self, resolver: &dyn ProxyResolver) -> Option<SharedProxy> {
        resolver.resolve(self.id)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("fields", &*self.fields.read())
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("extended", &self.extended.is_some())
            .finish()
    }
}
