//! Error types for composition, state transfer and the operation state machine

use crate::operation::OperationStatus;
use persona_core::{InjectionKind, ProxyError, ProxyId};
use std::fmt;
use thiserror::Error;

/// Way in which a transfer handler was misused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    SourceSetTwice,
    DestinationSetTwice,
    SourceUnset,
    DestinationUnset,
    AlreadyTransferred,
    NotTransferred,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::SourceSetTwice => "source set twice",
            Self::DestinationSetTwice => "destination set twice",
            Self::SourceUnset => "source not set",
            Self::DestinationUnset => "destination not set",
            Self::AlreadyTransferred => "transfer already performed",
            Self::NotTransferred => "transfer not yet performed",
        };
        f.write_str(message)
    }
}

/// Error raised by a [`TransferHandler`](crate::TransferHandler)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// The single-use protocol was violated
    #[error("Transfer protocol violation: {0}")]
    ProtocolViolation(ProtocolViolation),

    /// Extended state could not be copied
    #[error("Extended state transfer failed")]
    ExtendedState {
        #[source]
        source: ProxyError,
    },
}

impl From<ProtocolViolation> for TransferError {
    fn from(violation: ProtocolViolation) -> Self {
        Self::ProtocolViolation(violation)
    }
}

/// Underlying reason a composition failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionCause {
    /// Role publishes no contract but a contract composition was requested
    #[error("Role '{role}' declares no public contract")]
    MissingContract { role: String },

    /// Role publishes no marker but a marker composition was requested
    #[error("Role '{role}' declares no visibility marker")]
    MissingMarker { role: String },

    #[error("Class {class} already implements {contract}")]
    ContractAlreadyPresent { class: String, contract: String },

    #[error("Class {class} already carries marker {marker}")]
    MarkerAlreadyPresent { class: String, marker: String },

    /// No removable ancestor qualifies; the handle never had the role
    #[error("No ancestor of {class} qualifies for removing {target}")]
    AncestryNotFound { class: String, target: String },

    /// Contract lists the same operation twice
    #[error("Contract {contract} declares operation '{operation}' more than once")]
    DuplicateOperation { contract: String, operation: String },

    /// Forwarder generation was requested before preparation
    #[error("Forwarder generator used before prepare")]
    ForwardersNotPrepared,

    /// Synthesized class name is already registered
    #[error("Class name {name} is already registered")]
    NameCollision { name: String },

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Misuse of a [`CompositionOperation`](crate::CompositionOperation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Composition requires a queued operation
    #[error("Operation is {status}, expected QUEUED")]
    NotQueued { status: OperationStatus },

    /// Completed operations are immutable
    #[error("Operation is {status} and can no longer change")]
    Sealed { status: OperationStatus },
}

/// Error surfaced by the composition engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionError {
    /// Synthesis, instantiation, binding or transfer failed
    #[error("Composition {kind} of role '{role}' on {proxy} failed")]
    Failed {
        proxy: ProxyId,
        kind: InjectionKind,
        role: String,
        #[source]
        cause: CompositionCause,
    },

    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl CompositionError {
    /// Underlying cause of a failed composition
    pub fn cause(&self) -> Option<&CompositionCause> {
        match self {
            Self::Failed { cause, .. } => Some(cause),
            Self::Operation(_) => None,
        }
    }

    pub fn is_ancestry_not_found(&self) -> bool {
        matches!(
            self.cause(),
            Some(CompositionCause::AncestryNotFound { .. })
        )
    }

    pub fn is_transfer_violation(&self) -> bool {
        matches!(
            self.cause(),
            Some(CompositionCause::Transfer(TransferError::ProtocolViolation(_)))
        )
    }
}
