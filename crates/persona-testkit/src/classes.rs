//! Fixture handle classes

use persona_core::{ExtendedState, ProxyClass, ProxyError};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `DBProxy` with `property1 = 0` and `property2 = ""`
pub fn db_proxy_class() -> Arc<ProxyClass> {
    ProxyClass::base("DBProxy")
        .field("property1", 0)
        .field("property2", "")
        .build()
}

/// `MeteredProxy` with a `calls` field and [`UsageCounters`] as extended state
pub fn metered_proxy_class() -> Arc<ProxyClass> {
    ProxyClass::base("MeteredProxy")
        .field("calls", 0)
        .extension(|| Box::new(UsageCounters::default()))
        .build()
}

/// Per-operation call counters kept outside the field layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageCounters {
    counts: BTreeMap<String, u64>,
}

impl UsageCounters {
    pub fn record(&mut self, operation: &str) {
        *self.counts.entry(operation.to_string()).or_default() += 1;
    }

    pub fn count(&self, operation: &str) -> u64 {
        self.counts.get(operation).copied().unwrap_or(0)
    }
}

impl ExtendedState for UsageCounters {
    fn copy_into(&self, destination: &mut dyn ExtendedState) -> Result<(), ProxyError> {
        let target = destination
            .as_any_mut()
            .downcast_mut::<UsageCounters>()
            .ok_or_else(|| ProxyError::extended_state("destination does not hold UsageCounters"))?;
        target.counts.clone_from(&self.counts);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
