//! Ancestry walks used by the removal compositions

use persona_core::ProxyClass;
use std::sync::Arc;

/// Result of splitting a class chain at the layer to remove
#[derive(Debug, Clone)]
pub struct LayerSplit {
    /// Parent of the removed layer; the re-stacked layers go on top of it
    pub base: Arc<ProxyClass>,
    /// The removed layer
    pub removed: Arc<ProxyClass>,
    /// Layers that sat above the removed one, bottom-to-top
    pub retained: Vec<Arc<ProxyClass>>,
}

/// Split `class` at the most-derived layer for which `declares` holds
///
/// Returns `None` when no synthesized layer matches. A base class is never
/// removable, even when it declares the target itself.
pub fn split_at<F>(class: &Arc<ProxyClass>, declares: F) -> Option<LayerSplit>
where
    F: Fn(&ProxyClass) -> bool,
{
    let mut above = Vec::new();
    for layer in class.ancestry() {
        if declares(layer.as_ref()) {
            let base = layer.parent().cloned()?;
            above.reverse();
            return Some(LayerSplit {
                base,
                removed: layer,
                retained: above,
            });
        }
        above.push(layer);
    }
    None
}

/// Nearest ancestor of `class` that no longer implements `contract`
///
/// Unless `strict` is set, a most-derived class declaring exactly one
/// interface is treated as a pure role layer: the walk starts at its parent,
/// whichever interface that layer declares. Otherwise `class` must implement
/// `contract`. Returns `None` when that check fails, or when every ancestor
/// up to the root still implements `contract`.
pub fn remove_until_target(
    class: &Arc<ProxyClass>,
    contract: &str,
    strict: bool,
) -> Option<Arc<ProxyClass>> {
    let mut candidate = if !strict && class.declared_interfaces().len() == 1 {
        class.parent().cloned()?
    } else if class.implements(contract) {
        Arc::clone(class)
    } else {
        return None;
    };
    while candidate.implements(contract) {
        candidate = candidate.parent().cloned()?;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use persona_core::{BindingKey, RoleContract, VisibilityMarker};

    fn role_layer(name: &str, parent: &Arc<ProxyClass>, contract: &str) -> Arc<ProxyClass> {
        ProxyClass::role_layer(
            name,
            parent.clone(),
            Arc::new(RoleContract::new(contract)),
            BindingKey::for_contract(contract),
            IndexMap::new(),
        )
    }

    /// DBProxy <- +IAdmin <- +Audited <- +IAuditor
    fn stacked() -> Vec<Arc<ProxyClass>> {
        let base = ProxyClass::base("DBProxy").field("property1", 0).build();
        let admin = role_layer("DBProxy_roled_1_1", &base, "IAdmin");
        let audited = ProxyClass::marker_layer(
            "DBProxy_roled_1_1_roled_2_1",
            admin.clone(),
            VisibilityMarker::new("Audited"),
        );
        let auditor = role_layer("DBProxy_roled_1_1_roled_2_1_roled_3_1", &audited, "IAuditor");
        vec![base, admin, audited, auditor]
    }

    #[test]
    fn test_split_keeps_layers_above_in_order() {
        let chain = stacked();
        let top = &chain[3];
        let split = split_at(top, |c| c.declares_contract("IAdmin")).unwrap();
        assert_eq!(split.base, chain[0]);
        assert_eq!(split.removed, chain[1]);
        let retained: Vec<&str> = split.retained.iter().map(|c| c.name()).collect();
        assert_eq!(
            retained,
            vec!["DBProxy_roled_1_1_roled_2_1", "DBProxy_roled_1_1_roled_2_1_roled_3_1"]
        );
    }

    #[test]
    fn test_split_top_layer_retains_nothing() {
        let chain = stacked();
        let split = split_at(&chain[3], |c| c.declares_contract("IAuditor")).unwrap();
        assert_eq!(split.base, chain[2]);
        assert!(split.retained.is_empty());
    }

    #[test]
    fn test_split_never_removes_base() {
        let base = ProxyClass::base("Conforming").contract("IAdmin").build();
        let top = role_layer("Conforming_roled_1_1", &base, "IAuditor");
        assert!(split_at(&top, |c| c.declares_contract("IAdmin")).is_none());
        assert!(split_at(&top, |c| c.declares_contract("IMissing")).is_none());
    }

    #[test]
    fn test_remove_until_skips_pure_role_layer() {
        let chain = stacked();
        let target = remove_until_target(&chain[1], "IAdmin", false).unwrap();
        assert_eq!(target, chain[0]);
        let strict = remove_until_target(&chain[1], "IAdmin", true).unwrap();
        assert_eq!(strict, chain[0]);
    }

    #[test]
    fn test_remove_until_discards_everything_above() {
        let chain = stacked();
        for strict in [false, true] {
            let target = remove_until_target(&chain[3], "IAdmin", strict).unwrap();
            assert_eq!(target, chain[0]);
        }
        let auditor = remove_until_target(&chain[3], "IAuditor", false).unwrap();
        assert_eq!(auditor, chain[2]);
    }

    #[test]
    fn test_remove_until_single_interface_top_is_dropped_regardless() {
        let base = ProxyClass::base("DBProxy").field("property1", 0).build();
        let auditor = role_layer("DBProxy_roled_1_1", &base, "IAuditor");
        let target = remove_until_target(&auditor, "IAdmin", false).unwrap();
        assert_eq!(target, base);
        assert!(remove_until_target(&auditor, "IAdmin", true).is_none());
    }

    #[test]
    fn test_remove_until_lenient_drops_top_marker() {
        let base = ProxyClass::base("DBProxy").build();
        let audited = ProxyClass::marker_layer(
            "DBProxy_roled_1_1",
            base.clone(),
            VisibilityMarker::new("Audited"),
        );
        assert_eq!(remove_until_target(&audited, "IAdmin", false).unwrap(), base);
        assert!(remove_until_target(&audited, "IAdmin", true).is_none());
    }

    #[test]
    fn test_remove_until_not_found() {
        let chain = stacked();
        assert!(remove_until_target(&chain[0], "IAdmin", false).is_none());

        let base = ProxyClass::base("Conforming").contract("IAdmin").build();
        let top = role_layer("Conforming_roled_1_1", &base, "IAdmin");
        assert!(remove_until_target(&top, "IAdmin", false).is_none());
        assert!(remove_until_target(&top, "IAdmin", true).is_none());
    }
}
