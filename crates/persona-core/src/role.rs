//! Role contracts and the role implementation interface
//!
//! A role is an opaque implementation object. It may publish a
//! [`RoleContract`] (the operations a handle gains when the role is
//! attached) and/or a [`VisibilityMarker`] (a contract-free tag that makes
//! the role's presence detectable). Operations are invoked by name with
//! JSON-encoded arguments so forwarders can stay generic over every contract.

use crate::errors::RoleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shape of a parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
    Any,
}

impl ValueKind {
    /// Check whether a JSON value conforms to this kind
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

/// Named, typed parameter of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: ValueKind,
}

/// Signature of one contract operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSignature {
    name: String,
    parameters: Vec<ParameterDescriptor>,
    returns: ValueKind,
}

impl OperationSignature {
    /// Create a signature with no parameters returning `Null`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns: ValueKind::Null,
        }
    }

    /// Append a parameter
    pub fn param(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    /// Set the return kind
    pub fn returns(mut self, kind: ValueKind) -> Self {
        self.returns = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn return_kind(&self) -> ValueKind {
        self.returns
    }
}

/// Public contract a role fulfils
///
/// Contracts are identified by name; two contracts with the same name are
/// the same contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleContract {
    name: String,
    operations: Vec<OperationSignature>,
}

impl RoleContract {
    /// Create an empty contract
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Add an operation to the contract
    pub fn operation(mut self, signature: OperationSignature) -> Self {
        self.operations.push(signature);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[OperationSignature] {
        &self.operations
    }

    /// Find an operation by name
    pub fn find(&self, operation: &str) -> Option<&OperationSignature> {
        self.operations.iter().find(|op| op.name == operation)
    }
}

impl PartialEq for RoleContract {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RoleContract {}

impl fmt::Display for RoleContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Contract-free tag announcing that a role is attached
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisibilityMarker(String);

impl VisibilityMarker {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisibilityMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named task a role offers to the scheduler
///
/// Not consumed by composition; carried for repository and scheduler
/// integrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub returns: ValueKind,
}

/// Catalog record describing a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub role: String,
    pub contract: Option<String>,
    pub marker: Option<String>,
    pub operations: Vec<String>,
    pub tasks: Vec<TaskDescriptor>,
}

/// Implementation object that can be attached to a proxy
pub trait Role: Send + Sync + 'static {
    /// Human readable role name, used in logs and descriptors
    fn name(&self) -> &str;

    /// Contract this role fulfils, if any
    fn public_contract(&self) -> Option<Arc<RoleContract>>;

    /// Marker announcing this role, if any
    fn visibility_marker(&self) -> Option<VisibilityMarker> {
        None
    }

    /// Tasks offered to the scheduler
    fn tasks(&self) -> Vec<TaskDescriptor> {
        Vec::new()
    }

    /// Execute a contract operation with JSON arguments
    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value, RoleError>;

    /// Downcast hook for typed access to the concrete role
    fn as_any(&self) -> &dyn Any;

    fn public_contract_name(&self) -> Option<String> {
        self.public_contract().map(|c| c.name().to_string())
    }

    fn visibility_marker_name(&self) -> Option<String> {
        self.visibility_marker().map(|m| m.name().to_string())
    }

    /// Build the catalog record for this role
    fn descriptor(&self) -> RoleDescriptor {
        let contract = self.public_contract();
        RoleDescriptor {
            role: self.name().to_string(),
            contract: contract.as_ref().map(|c| c.name().to_string()),
            marker: self.visibility_marker_name(),
            operations: contract
                .map(|c| c.operations().iter().map(|op| op.name().to_string()).collect())
                .unwrap_or_default(),
            tasks: self.tasks(),
        }
    }
}

impl fmt::Debug for dyn Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.name())
            .field("contract", &self.public_contract_name())
            .field("marker", &self.visibility_marker_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoRole {
        contract: Arc<RoleContract>,
    }

    impl Role for EchoRole {
        fn name(&self) -> &str {
            "echo"
        }

        fn public_contract(&self) -> Option<Arc<RoleContract>> {
            Some(self.contract.clone())
        }

        fn tasks(&self) -> Vec<TaskDescriptor> {
            vec![TaskDescriptor {
                name: "flush".to_string(),
                parameters: Vec::new(),
                returns: ValueKind::Null,
            }]
        }

        fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value, RoleError> {
            match operation {
                "echo" => Ok(args.first().cloned().unwrap_or(Value::Null)),
                _ => Err(RoleError::unknown_operation(operation)),
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn echo_role() -> EchoRole {
        EchoRole {
            contract: Arc::new(
                RoleContract::new("IEcho").operation(
                    OperationSignature::new("echo")
                        .param("value", ValueKind::Any)
                        .returns(ValueKind::Any),
                ),
            ),
        }
    }

    #[test]
    fn test_descriptor_lists_contract_operations_and_tasks() {
        let descriptor = echo_role().descriptor();
        assert_eq!(descriptor.role, "echo");
        assert_eq!(descriptor.contract.as_deref(), Some("IEcho"));
        assert_eq!(descriptor.marker, None);
        assert_eq!(descriptor.operations, vec!["echo".to_string()]);
        assert_eq!(descriptor.tasks.len(), 1);
    }

    #[test]
    fn test_contract_identity_is_by_name() {
        let a = RoleContract::new("IAdmin").operation(OperationSignature::new("a"));
        let b = RoleContract::new("IAdmin");
        assert_eq!(a, b);
        assert!(a.find("a").is_some());
        assert!(b.find("a").is_none());
    }

    #[test]
    fn test_value_kind_admits() {
        assert!(ValueKind::String.admits(&json!("x")));
        assert!(!ValueKind::String.admits(&json!(1)));
        assert!(ValueKind::Float.admits(&json!(1)));
        assert!(ValueKind::Integer.admits(&json!(-3)));
        assert!(ValueKind::Any.admits(&Value::Null));
    }
}
