//! Pluggable persistence for documents.
//!
//! The [`Store`] trait is the only storage surface the binder and curator
//! see. Two implementations ship with the library: [`MemoryStore`] for
//! tests and ephemeral deployments, and [`FileStore`] for one-JSON-file-
//! per-document persistence.

use async_trait::async_trait;

use crate::document::{Document, DocumentId};

mod errors;
mod file;
mod memory;

pub use errors::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

/// Document persistence, keyed by document id.
///
/// Writes for distinct ids are independent; each binder is the sole
/// writer for its own document, so implementations only need isolation
/// between ids, not between writers of one id.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new document. Fails with [`StoreError::AlreadyExists`]
    /// when the id is taken.
    async fn create(&self, document: &Document) -> Result<(), StoreError>;

    /// Overwrite an existing document. Fails with [`StoreError::NotFound`]
    /// when the id is unknown.
    async fn update(&self, document: &Document) -> Result<(), StoreError>;

    /// Load a document by id.
    async fn read(&self, id: &DocumentId) -> Result<Document, StoreError>;
}
