//! Error types for the store module.

use thiserror::Error;

use crate::document::DocumentId;

/// Errors that can occur while persisting or loading documents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No document with this id exists in the store.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// Create was called with an id that is already taken.
    #[error("document already exists: {0}")]
    AlreadyExists(DocumentId),

    /// The underlying storage failed. Retryable; the binder's flush loop
    /// retries on its next tick.
    #[error("store I/O error for {id}: {source}")]
    Io {
        id: DocumentId,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document could not be encoded or decoded.
    #[error("store serialization error for {id}: {source}")]
    Serialize {
        id: DocumentId,
        #[source]
        source: serde_json::Error,
    },

    /// The store's backing directory could not be prepared.
    #[error("store directory error at {path}: {source}")]
    Directory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Check if this error indicates a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Check if this error indicates an id collision on create.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    /// Check if this error is worth retrying on the next flush tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }
}
