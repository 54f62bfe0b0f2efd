//! Error types for the curator module.

use thiserror::Error;

use crate::auth::AccessLevel;
use crate::document::DocumentId;

/// Errors that can occur while joining, creating, or administering
/// documents through the curator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CuratorError {
    /// The authenticator granted less than the operation requires.
    #[error("unauthorized: {granted:?} access, {required:?} required")]
    Unauthorized {
        granted: AccessLevel,
        required: AccessLevel,
    },

    /// No live binder exists for this document.
    #[error("no open binder for document {0}")]
    BinderNotFound(DocumentId),

    /// The curator has been closed and accepts no more work.
    #[error("curator is closed")]
    Closed,
}

impl CuratorError {
    /// Check if this error indicates a missing binder.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CuratorError::BinderNotFound(_))
    }
}
