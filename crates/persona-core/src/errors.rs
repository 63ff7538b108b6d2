//! Error types shared by handles, roles and configuration

use crate::identifiers::ProxyId;
use thiserror::Error;

/// Error raised by a role implementation while serving an operation
///
/// Forwarders hand these back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    /// The role does not provide the operation
    #[error("Role does not provide operation '{operation}'")]
    UnknownOperation { operation: String },

    /// Arguments could not be interpreted by the role
    #[error("Invalid arguments for '{operation}': {message}")]
    InvalidArguments { operation: String, message: String },

    /// The operation ran and failed
    #[error("Operation '{operation}' failed: {message}")]
    Failed { operation: String, message: String },
}

impl RoleError {
    /// Create an unknown operation error
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an operation failure
    pub fn failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Error raised when calling through a proxy handle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    /// No class in the handle's ancestry forwards the operation
    #[error("Class {class} has no operation '{operation}'")]
    UnknownOperation { class: String, operation: String },

    /// Argument count does not match the contract signature
    #[error("Operation '{operation}' takes {expected} argument(s), got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    /// A forwarder exists but no role instance is bound under its key
    #[error("No role bound under key '{key}' on {proxy}")]
    Unbound { proxy: ProxyId, key: String },

    /// Field is not part of the class layout
    #[error("Class {class} has no field '{field}'")]
    UnknownField { class: String, field: String },

    /// Extended state could not be copied between handles
    #[error("Extended state copy failed: {message}")]
    ExtendedState { message: String },

    /// Error returned by the bound role, unchanged
    #[error(transparent)]
    Role(#[from] RoleError),
}

impl ProxyError {
    /// Create an extended state error
    pub fn extended_state(message: impl Into<String>) -> Self {
        Self::ExtendedState {
            message: message.into(),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected schema
    #[error("Invalid config: {message}")]
    Parse { message: String },

    /// A value is out of range or inconsistent
    #[error("Invalid config value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}
