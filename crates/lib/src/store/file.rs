//! File-backed store implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{Store, StoreError};
use crate::document::{Document, DocumentId};

/// A store keeping one JSON file per document under a directory.
///
/// File names are derived from document ids; ids carrying characters
/// outside `[A-Za-z0-9_-]` are refused so a hostile id can never escape
/// the store directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `directory`, creating it if needed.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| StoreError::Directory {
                path: directory.clone(),
                source,
            })?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: &DocumentId) -> Result<PathBuf, StoreError> {
        let safe = !id.as_str().is_empty()
            && id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(self.directory.join(format!("{id}.json")))
    }

    async fn write(&self, document: &Document) -> Result<(), StoreError> {
        let path = self.path_for(&document.id)?;
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| {
            StoreError::Serialize {
                id: document.id.clone(),
                source,
            }
        })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StoreError::Io {
                id: document.id.clone(),
                source,
            })?;
        debug!(document = %document.id, path = %path.display(), "wrote document");
        Ok(())
    }

    async fn exists(&self, id: &DocumentId) -> Result<bool, StoreError> {
        match self.path_for(id) {
            Ok(path) => Ok(tokio::fs::try_exists(&path).await.map_err(|source| {
                StoreError::Io {
                    id: id.clone(),
                    source,
                }
            })?),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl Store for FileStore {
    async fn create(&self, document: &Document) -> Result<(), StoreError> {
        if self.exists(&document.id).await? {
            return Err(StoreError::AlreadyExists(document.id.clone()));
        }
        self.write(document).await
    }

    async fn update(&self, document: &Document) -> Result<(), StoreError> {
        if !self.exists(&document.id).await? {
            return Err(StoreError::NotFound(document.id.clone()));
        }
        self.write(document).await
    }

    async fn read(&self, id: &DocumentId) -> Result<Document, StoreError> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    id: id.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialize {
            id: id.clone(),
            source,
        })
    }
}
