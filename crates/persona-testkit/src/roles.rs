//! Fixture roles

use parking_lot::Mutex;
use persona_core::{
    OperationSignature, Role, RoleContract, RoleError, TaskDescriptor, ValueKind,
    VisibilityMarker,
};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;

/// `IAdmin { createDatabase(name: String) -> Bool }`
pub fn admin_contract() -> Arc<RoleContract> {
    Arc::new(
        RoleContract::new("IAdmin").operation(
            OperationSignature::new("createDatabase")
                .param("name", ValueKind::String)
                .returns(ValueKind::Bool),
        ),
    )
}

/// `IAuditor { record(entry: String) -> Integer, auditCount() -> Integer }`
pub fn auditor_contract() -> Arc<RoleContract> {
    Arc::new(
        RoleContract::new("IAuditor")
            .operation(
                OperationSignature::new("record")
                    .param("entry", ValueKind::String)
                    .returns(ValueKind::Integer),
            )
            .operation(OperationSignature::new("auditCount").returns(ValueKind::Integer)),
    )
}

/// Administrator role remembering every database it was asked to create
pub struct AdminRole {
    contract: Arc<RoleContract>,
    outcome: bool,
    created: Mutex<Vec<String>>,
}

impl AdminRole {
    /// Admin whose `createDatabase` answers `true`
    pub fn new() -> Self {
        Self::answering(true)
    }

    /// Admin whose `createDatabase` answers `outcome`
    pub fn answering(outcome: bool) -> Self {
        Self {
            contract: admin_contract(),
            outcome,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }
}

impl Default for AdminRole {
    fn default() -> Self {
        Self::new()
    }
}

impl Role for AdminRole {
    fn name(&self) -> &str {
        "admin"
    }

    fn public_contract(&self) -> Option<Arc<RoleContract>> {
        Some(Arc::clone(&self.contract))
    }

    fn tasks(&self) -> Vec<TaskDescriptor> {
        vec![TaskDescriptor {
            name: "vacuum".to_string(),
            parameters: Vec::new(),
            returns: ValueKind::Null,
        }]
    }

    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value, RoleError> {
        match operation {
            "createDatabase" => {
                let name = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoleError::invalid_arguments(operation, "expected a name"))?;
                if name.is_empty() {
                    return Err(RoleError::failed(operation, "database name is empty"));
                }
                self.created.lock().push(name.to_string());
                Ok(json!(self.outcome))
            }
            _ => Err(RoleError::unknown_operation(operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Auditor role keeping an in-memory journal
pub struct AuditorRole {
    contract: Arc<RoleContract>,
    journal: Mutex<Vec<String>>,
}

impl AuditorRole {
    pub fn new() -> Self {
        Self {
            contract: auditor_contract(),
            journal: Mutex::new(Vec::new()),
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

impl Default for AuditorRole {
    fn default() -> Self {
        Self::new()
    }
}

impl Role for AuditorRole {
    fn name(&self) -> &str {
        "auditor"
    }

    fn public_contract(&self) -> Option<Arc<RoleContract>> {
        Some(Arc::clone(&self.contract))
    }

    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value, RoleError> {
        match operation {
            "record" => {
                let entry = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| RoleError::invalid_arguments(operation, "expected an entry"))?;
                let mut journal = self.journal.lock();
                journal.push(entry.to_string());
                Ok(json!(journal.len()))
            }
            "auditCount" => Ok(json!(self.journal.lock().len())),
            _ => Err(RoleError::unknown_operation(operation)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Contract-free role that only announces a visibility marker
pub struct MarkerRole {
    marker: VisibilityMarker,
}

impl MarkerRole {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: VisibilityMarker::new(marker),
        }
    }
}

impl Role for MarkerRole {
    fn name(&self) -> &str {
        self.marker.name()
    }

    fn public_contract(&self) -> Option<Arc<RoleContract>> {
        None
    }

    fn visibility_marker(&self) -> Option<VisibilityMarker> {
        Some(self.marker.clone())
    }

    fn invoke(&self, operation: &str, _args: &[Value]) -> Result<Value, RoleError> {
        Err(RoleError::unknown_operation(operation))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
