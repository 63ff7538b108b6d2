//! Kinds of composition requests

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a composition should do to a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectionKind {
    /// Attach a role's public contract and forwarders
    AddPublicRole,
    /// Detach a role's public contract
    RemovePublicRole,
    /// Attach a role's visibility marker
    AddVisibleRoleMarker,
    /// Detach a role's visibility marker
    RemoveVisibleRoleMarker,
}

impl InjectionKind {
    /// Whether the request attaches something
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::AddPublicRole | Self::AddVisibleRoleMarker)
    }

    /// Whether the request targets a marker instead of a contract
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            Self::AddVisibleRoleMarker | Self::RemoveVisibleRoleMarker
        )
    }
}

impl fmt::Display for InjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AddPublicRole => "ADD_PUBLIC_ROLE",
            Self::RemovePublicRole => "REMOVE_PUBLIC_ROLE",
            Self::AddVisibleRoleMarker => "ADD_VISIBLE_ROLE_MARKER",
            Self::RemoveVisibleRoleMarker => "REMOVE_VISIBLE_ROLE_MARKER",
        };
        f.write_str(label)
    }
}
