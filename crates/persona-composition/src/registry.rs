//! Process-wide cache of synthesized classes keyed by name
//!
//! A class enters the registry only once the composition that produced it
//! has succeeded, so a failed attempt never leaves a class behind.

use crate::errors::CompositionCause;
use parking_lot::RwLock;
use persona_core::ProxyClass;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name-keyed class registry, shareable between engines
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, Arc<ProxyClass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every class or none of them
    ///
    /// Fails with [`CompositionCause::NameCollision`] when any name is already
    /// taken, or appears twice in `classes`.
    pub fn register_all(&self, classes: &[Arc<ProxyClass>]) -> Result<(), CompositionCause> {
        let mut registered = self.classes.write();
        for (index, class) in classes.iter().enumerate() {
            let repeated = classes[..index].iter().any(|c| c.name() == class.name());
            if repeated || registered.contains_key(class.name()) {
                return Err(CompositionCause::NameCollision {
                    name: class.name().to_string(),
                });
            }
        }
        for class in classes {
            registered.insert(class.name().to_string(), Arc::clone(class));
        }
        if !classes.is_empty() {
            debug!(count = classes.len(), total = registered.len(), "classes registered");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProxyClass>> {
        self.classes.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// Registered class names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use persona_core::VisibilityMarker;

    #[test]
    fn test_register_all_is_atomic() {
        let registry = ClassRegistry::new();
        let base = ProxyClass::base("Plain").build();
        let first = ProxyClass::marker_layer("Plain_roled_1_1", base.clone(), VisibilityMarker::new("A"));
        registry.register_all(&[first.clone()]).unwrap();
        assert!(registry.contains("Plain_roled_1_1"));

        let second = ProxyClass::marker_layer("Plain_roled_2_1", base.clone(), VisibilityMarker::new("B"));
        let clash = ProxyClass::marker_layer("Plain_roled_1_1", base, VisibilityMarker::new("C"));
        assert_matches!(
            registry.register_all(&[second, clash]),
            Err(CompositionCause::NameCollision { name }) if name == "Plain_roled_1_1"
        );
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("Plain_roled_2_1"));
        assert_eq!(registry.get("Plain_roled_1_1"), Some(first));
    }

    #[test]
    fn test_duplicate_within_batch_rejected() {
        let registry = ClassRegistry::new();
        let base = ProxyClass::base("Plain").build();
        let a = ProxyClass::marker_layer("Twin", base.clone(), VisibilityMarker::new("A"));
        let b = ProxyClass::marker_layer("Twin", base, VisibilityMarker::new("B"));
        assert!(registry.register_all(&[a, b]).is_err());
        assert!(registry.is_empty());
    }
}
