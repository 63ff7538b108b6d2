//! Single-use state transfer between handle instances
//!
//! A [`TransferHandler`] copies the observable state of a source handle into
//! a freshly instantiated destination. Each side can be set once, and the
//! transfer itself runs once. A stale handler therefore cannot mix two
//! compositions. The copy is all-or-nothing: every value is computed before
//! the destination is touched.

use crate::errors::{ProtocolViolation, TransferError};
use persona_core::{BindingKey, Proxy, Role, SharedProxy};
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Copies identity, fields, bindings and extended state from source to destination
#[derive(Debug, Default)]
pub struct TransferHandler {
    source: Option<SharedProxy>,
    destination: Option<Proxy>,
    source_set: bool,
    destination_set: bool,
    transferred: bool,
}

impl TransferHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_source(&mut self, source: SharedProxy) -> Result<(), TransferError> {
        if self.source_set {
            return Err(ProtocolViolation::SourceSetTwice.into());
        }
        self.source = Some(source);
        self.source_set = true;
        Ok(())
    }

    /// Set the freshly built destination; it stays owned until taken back
    pub fn set_destination(&mut self, destination: Proxy) -> Result<(), TransferError> {
        if self.destination_set {
            return Err(ProtocolViolation::DestinationSetTwice.into());
        }
        self.destination = Some(destination);
        self.destination_set = true;
        Ok(())
    }

    pub fn source(&self) -> Option<&SharedProxy> {
        self.source.as_ref()
    }

    pub fn destination(&self) -> Option<&Proxy> {
        self.destination.as_ref()
    }

    pub fn is_transferred(&self) -> bool {
        self.transferred
    }

    /// Copy source state into the destination
    ///
    /// Copies the identity, every destination field the source also has, the
    /// source bindings the destination class still forwards through (keeping
    /// bindings already on the destination), then extended state when both
    /// sides carry it.
    pub fn transfer(&mut self) -> Result<bool, TransferError> {
        if self.transferred {
            return Err(ProtocolViolation::AlreadyTransferred.into());
        }
        let source = self
            .source
            .as_ref()
            .ok_or(ProtocolViolation::SourceUnset)?;
        let destination = self
            .destination
            .as_mut()
            .ok_or(ProtocolViolation::DestinationUnset)?;

        let source_fields = source.fields();
        let fields: Vec<(String, Value)> = destination
            .fields_mut()
            .keys()
            .filter_map(|name| {
                source_fields
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();

        let referenced = destination.class().referenced_keys();
        let bindings: Vec<(BindingKey, Arc<dyn Role>)> = source
            .bindings()
            .filter(|(key, _)| referenced.contains(*key) && destination.bound_role(key).is_none())
            .map(|(key, role)| (key.clone(), Arc::clone(role)))
            .collect();

        let extended = match destination.class().extension_factory() {
            Some(factory) if source.has_extended_state() && destination.has_extended_state() => {
                let mut scratch = factory();
                let copied = source.with_extended(|state| state.copy_into(scratch.as_mut()));
                if let Some(Err(err)) = copied {
                    return Err(TransferError::ExtendedState { source: err });
                }
                Some(scratch)
            }
            _ => None,
        };

        destination.adopt_identity(source.id());
        let field_count = fields.len();
        let target_fields = destination.fields_mut();
        for (name, value) in fields {
            target_fields.insert(name, value);
        }
        let binding_count = bindings.len();
        for (key, role) in bindings {
            destination.bind(key, role);
        }
        if let Some(state) = extended {
            destination.replace_extended(state);
        }

        self.transferred = true;
        trace!(
            proxy = %source.id(),
            from = %source.class_name(),
            to = %destination.class_name(),
            fields = field_count,
            bindings = binding_count,
            "handle state transferred"
        );
        Ok(true)
    }

    /// Take the populated destination back out
    pub fn take_destination(&mut self) -> Result<Proxy, TransferError> {
        if !self.transferred {
            return Err(ProtocolViolation::NotTransferred.into());
        }
        self.destination
            .take()
            .ok_or_else(|| ProtocolViolation::DestinationUnset.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use persona_core::{ExtendedState, ProxyClass, ProxyError};
    use persona_testkit::{db_proxy_class, metered_proxy_class, UsageCounters};
    use serde_json::json;

    #[test]
    fn test_setting_source_twice_is_violation() {
        let class = db_proxy_class();
        let mut handler = TransferHandler::new();
        handler.set_source(Proxy::shared(&class)).unwrap();
        assert_matches!(
            handler.set_source(Proxy::shared(&class)),
            Err(TransferError::ProtocolViolation(
                ProtocolViolation::SourceSetTwice
            ))
        );
    }

    #[test]
    fn test_setting_destination_twice_is_violation() {
        let class = db_proxy_class();
        let mut handler = TransferHandler::new();
        handler
            .set_destination(Proxy::instantiate(&class))
            .unwrap();
        assert_matches!(
            handler.set_destination(Proxy::instantiate(&class)),
            Err(TransferError::ProtocolViolation(
                ProtocolViolation::DestinationSetTwice
            ))
        );
    }

    #[test]
    fn test_transfer_requires_both_sides() {
        let class = db_proxy_class();
        let mut handler = TransferHandler::new();
        assert_matches!(
            handler.transfer(),
            Err(TransferError::ProtocolViolation(ProtocolViolation::SourceUnset))
        );
        handler.set_source(Proxy::shared(&class)).unwrap();
        assert_matches!(
            handler.transfer(),
            Err(TransferError::ProtocolViolation(
                ProtocolViolation::DestinationUnset
            ))
        );
        assert_matches!(
            handler.take_destination(),
            Err(TransferError::ProtocolViolation(
                ProtocolViolation::NotTransferred
            ))
        );
    }

    #[test]
    fn test_transfer_copies_identity_and_fields_once() {
        let class = db_proxy_class();
        let source = Proxy::shared(&class);
        source.set_field("property1", 10).unwrap();
        source.set_field("property2", "X").unwrap();
        let destination = Proxy::instantiate(&class);
        assert_ne!(destination.id(), source.id());

        let mut handler = TransferHandler::new();
        handler.set_source(source.clone()).unwrap();
        handler.set_destination(destination).unwrap();
        assert!(handler.transfer().unwrap());
        assert_matches!(
            handler.transfer(),
            Err(TransferError::ProtocolViolation(
                ProtocolViolation::AlreadyTransferred
            ))
        );

        let copied = handler.take_destination().unwrap();
        assert_eq!(copied.id(), source.id());
        assert_eq!(copied.field("property1"), Some(json!(10)));
        assert_eq!(copied.field("property2"), Some(json!("X")));
    }

    #[test]
    fn test_only_shared_fields_are_copied() {
        let source_class = ProxyClass::base("Wide").field("a", 1).field("b", 2).build();
        let dest_class = ProxyClass::base("Narrow").field("b", 0).field("c", 0).build();
        let source = Proxy::shared(&source_class);
        source.set_field("b", 22).unwrap();

        let mut handler = TransferHandler::new();
        handler.set_source(source).unwrap();
        handler
            .set_destination(Proxy::instantiate(&dest_class))
            .unwrap();
        handler.transfer().unwrap();
        let copied = handler.take_destination().unwrap();
        assert_eq!(copied.field("b"), Some(json!(22)));
        assert_eq!(copied.field("c"), Some(json!(0)));
        assert_eq!(copied.field("a"), None);
    }

    #[test]
    fn test_extended_state_is_delegated() {
        let class = metered_proxy_class();
        let source = Proxy::shared(&class);
        source.with_extended(|state| {
            if let Some(counters) = state.as_any_mut().downcast_mut::<UsageCounters>() {
                counters.record("query");
                counters.record("query");
            }
        });

        let mut handler = TransferHandler::new();
        handler.set_source(source).unwrap();
        handler.set_destination(Proxy::instantiate(&class)).unwrap();
        handler.transfer().unwrap();
        let copied = handler.take_destination().unwrap();
        let count = copied
            .with_extended(|state| {
                state
                    .as_any()
                    .downcast_ref::<UsageCounters>()
                    .map(|c| c.count("query"))
            })
            .flatten();
        assert_eq!(count, Some(2));
    }

    #[derive(Debug)]
    struct Refusing;

    impl ExtendedState for Refusing {
        fn copy_into(&self, _destination: &mut dyn ExtendedState) -> Result<(), ProxyError> {
            Err(ProxyError::extended_state("refused"))
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_failed_extended_copy_leaves_destination_untouched() {
        let class = ProxyClass::base("Stubborn")
            .field("value", 0)
            .extension(|| Box::new(Refusing))
            .build();
        let source = Proxy::shared(&class);
        source.set_field("value", 5).unwrap();
        let destination = Proxy::instantiate(&class);
        let destination_id = destination.id();

        let mut handler = TransferHandler::new();
        handler.set_source(source).unwrap();
        handler.set_destination(destination).unwrap();
        assert_matches!(
            handler.transfer(),
            Err(TransferError::ExtendedState { .. })
        );
        assert!(!handler.is_transferred());
        let untouched = handler.destination().unwrap();
        assert_eq!(untouched.id(), destination_id);
        assert_eq!(untouched.field("value"), Some(json!(0)));
    }
}
