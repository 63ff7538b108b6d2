//! Composition operation context
//!
//! One [`CompositionOperation`] carries everything the engine needs for a
//! single attempt: the target handle, the role, what to do with it, and the
//! forwarder generator and transfer handler to use. It also reports the
//! attempt's outcome back to the caller.
//!
//! Status moves `QUEUED → STARTED → COMPLETED_SUCCESS | COMPLETED_FAILURE`
//! and never backwards. A failure cause and a non-failure status never
//! coexist.

use crate::errors::{CompositionCause, OperationError};
use crate::forwarder::{DelegatingForwarders, ForwarderGenerator};
use crate::transfer::TransferHandler;
use persona_core::{InjectionKind, Role, RoleContract, SharedProxy, VisibilityMarker};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    Queued,
    Started,
    CompletedSuccess,
    CompletedFailure,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CompletedSuccess | Self::CompletedFailure)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queued => "QUEUED",
            Self::Started => "STARTED",
            Self::CompletedSuccess => "COMPLETED_SUCCESS",
            Self::CompletedFailure => "COMPLETED_FAILURE",
        };
        f.write_str(label)
    }
}

/// How much a contract removal strips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalScope {
    /// Drop only the layer declaring the contract, re-stacking the layers above it
    Layer,
    /// Fall back to the nearest ancestor free of the contract
    Until,
}

/// Parameters and status of one composition attempt
pub struct CompositionOperation {
    kind: InjectionKind,
    scope: RemovalScope,
    target: SharedProxy,
    role: Arc<dyn Role>,
    contract: Option<Arc<RoleContract>>,
    marker: Option<VisibilityMarker>,
    forwarders: Box<dyn ForwarderGenerator>,
    transfer: TransferHandler,
    status: OperationStatus,
    cause: Option<CompositionCause>,
    result_class: Option<String>,
}

impl CompositionOperation {
    /// Queue a composition of `kind` for `role` on `target`
    ///
    /// The role's contract and marker are captured now; the default
    /// delegating forwarder generator and a fresh transfer handler are used.
    pub fn new(kind: InjectionKind, target: SharedProxy, role: Arc<dyn Role>) -> Self {
        Self {
            kind,
            scope: RemovalScope::Layer,
            contract: role.public_contract(),
            marker: role.visibility_marker(),
            target,
            role,
            forwarders: Box::new(DelegatingForwarders::default()),
            transfer: TransferHandler::new(),
            status: OperationStatus::Queued,
            cause: None,
            result_class: None,
        }
    }

    /// Queue a contract removal falling back to the nearest contract-free ancestor
    pub fn remove_until(target: SharedProxy, role: Arc<dyn Role>) -> Self {
        let mut operation = Self::new(InjectionKind::RemovePublicRole, target, role);
        operation.scope = RemovalScope::Until;
        operation
    }

    pub fn kind(&self) -> InjectionKind {
        self.kind
    }

    pub fn scope(&self) -> RemovalScope {
        self.scope
    }

    pub fn target(&self) -> &SharedProxy {
        &self.target
    }

    pub fn role(&self) -> &Arc<dyn Role> {
        &self.role
    }

    pub fn contract(&self) -> Option<&Arc<RoleContract>> {
        self.contract.as_ref()
    }

    pub fn marker(&self) -> Option<&VisibilityMarker> {
        self.marker.as_ref()
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn cause(&self) -> Option<&CompositionCause> {
        self.cause.as_ref()
    }

    /// Class name of the handle produced by a successful composition
    pub fn result_class(&self) -> Option<&str> {
        self.result_class.as_deref()
    }

    pub fn succeeded(&self) -> bool {
        self.status == OperationStatus::CompletedSuccess
    }

    /// Swap in a different forwarder generator
    pub fn set_forwarder_generator(
        &mut self,
        generator: Box<dyn ForwarderGenerator>,
    ) -> Result<(), OperationError> {
        self.ensure_queued()?;
        self.forwarders = generator;
        Ok(())
    }

    /// Swap in a different transfer handler
    pub fn set_transfer_handler(&mut self, handler: TransferHandler) -> Result<(), OperationError> {
        self.ensure_queued()?;
        self.transfer = handler;
        Ok(())
    }

    /// Record a failure; forces `COMPLETED_FAILURE`
    pub fn set_failure(&mut self, cause: CompositionCause) -> Result<(), OperationError> {
        if self.status.is_terminal() {
            return Err(OperationError::Sealed {
                status: self.status,
            });
        }
        self.fail(cause);
        Ok(())
    }

    pub(crate) fn start(&mut self) -> Result<(), OperationError> {
        if self.status != OperationStatus::Queued {
            return Err(OperationError::NotQueued {
                status: self.status,
            });
        }
        self.status = OperationStatus::Started;
        Ok(())
    }

    pub(crate) fn succeed(&mut self, class_name: &str) {
        debug_assert_eq!(self.status, OperationStatus::Started);
        self.status = OperationStatus::CompletedSuccess;
        self.result_class = Some(class_name.to_string());
    }

    pub(crate) fn fail(&mut self, cause: CompositionCause) {
        self.status = OperationStatus::CompletedFailure;
        self.cause = Some(cause);
    }

    pub(crate) fn transfer_mut(&mut self) -> &mut TransferHandler {
        &mut self.transfer
    }

    pub(crate) fn forwarders_mut(&mut self) -> &mut dyn ForwarderGenerator {
        self.forwarders.as_mut()
    }

    fn ensure_queued(&self) -> Result<(), OperationError> {
        match self.status {
            OperationStatus::Queued => Ok(()),
            status if status.is_terminal() => Err(OperationError::Sealed { status }),
            status => Err(OperationError::NotQueued { status }),
        }
    }
}

impl fmt::Debug for CompositionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionOperation")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("target", &self.target.id())
            .field("role", &self.role.name())
            .field("status", &self.status)
            .field("cause", &self.cause)
            .finish()
    }
}
