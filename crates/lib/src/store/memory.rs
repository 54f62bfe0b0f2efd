//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Store, StoreError};
use crate::document::{Document, DocumentId};

/// A simple in-memory store backed by a `HashMap`.
///
/// Suitable for testing, development, or deployments where documents are
/// intentionally ephemeral. Documents vanish when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with documents, for tests.
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            documents: RwLock::new(
                documents
                    .into_iter()
                    .map(|doc| (doc.id.clone(), doc))
                    .collect(),
            ),
        }
    }

    /// Remove a document outright, simulating backing-storage loss.
    pub fn remove(&self, id: &DocumentId) -> Option<Document> {
        self.documents.write().unwrap().remove(id)
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, document: &Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().unwrap();
        if documents.contains_key(&document.id) {
            return Err(StoreError::AlreadyExists(document.id.clone()));
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn update(&self, document: &Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().unwrap();
        match documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(document.id.clone())),
        }
    }

    async fn read(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.documents
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
