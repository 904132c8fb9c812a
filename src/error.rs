//! Import Errors
//!
//! Fatal failures of a discovery/rewrite run. Unresolved references are
//! reported in [`crate::rewrite::RewriteReport`] and only fail strict runs.

use thiserror::Error;

use crate::resource::ResourceKind;

/// Errors that abort an import run
#[derive(Debug, Error)]
pub enum ImportError {
    /// The remote API call failed (transport, auth, unexpected status)
    #[error("Keycloak API call {operation} failed for {scope}")]
    Remote {
        operation: &'static str,
        scope: String,
        #[source]
        source: anyhow::Error,
    },

    /// A structurally required field is missing on a discovered entity
    #[error("{kind} {remote_id} is missing required field `{field}`")]
    ShapeMismatch {
        kind: ResourceKind,
        remote_id: String,
        field: &'static str,
    },

    /// Two records resolve to the same symbolic name even after disambiguation
    #[error("Resource name `{name}` for {kind} {remote_id} collides with {existing}")]
    NameCollision {
        kind: ResourceKind,
        name: String,
        remote_id: String,
        /// Kind and remote ID of the record already holding the name
        existing: String,
    },

    /// Two records of one kind share a remote ID
    #[error("Duplicate remote ID {remote_id} for {kind}")]
    DuplicateRemoteId {
        kind: ResourceKind,
        remote_id: String,
    },

    /// Strict mode only: some foreign keys kept their raw value
    #[error("{count} references could not be resolved")]
    UnresolvedReferences { count: usize },
}

impl ImportError {
    /// Wrap a remote client failure with the operation and scope it happened in
    pub fn remote(
        operation: &'static str,
        scope: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        ImportError::Remote {
            operation,
            scope: scope.into(),
            source,
        }
    }

    /// Shape mismatch for a missing required field
    pub fn missing_field(
        kind: ResourceKind,
        remote_id: impl Into<String>,
        field: &'static str,
    ) -> Self {
        ImportError::ShapeMismatch {
            kind,
            remote_id: remote_id.into(),
            field,
        }
    }
}
