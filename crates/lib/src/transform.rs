//! The operational edit exchanged between clients and binders.

use serde::{Deserialize, Serialize};

/// A single edit against a document: delete `delete` code points at
/// `position`, then insert `insert` there.
///
/// `version` is the version the document will be at once this transform
/// has been applied. A client editing a snapshot at version `v` submits
/// its next edit with `version == v + 1`; the binder reassigns the field
/// when concurrent edits were accepted first.
///
/// All indices count Unicode code points, never bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    /// Code-point index the edit starts at.
    pub position: usize,
    /// Number of code points removed, starting at `position`.
    #[serde(rename = "num_delete", default)]
    pub delete: usize,
    /// Text inserted at `position` after the deletion.
    #[serde(default)]
    pub insert: String,
    /// Version this transform produces when applied.
    pub version: u64,
}

impl Transform {
    /// An insertion of `text` at `position`, producing `version`.
    pub fn insert(position: usize, text: impl Into<String>, version: u64) -> Self {
        Self {
            position,
            delete: 0,
            insert: text.into(),
            version,
        }
    }

    /// A deletion of `count` code points at `position`, producing `version`.
    pub fn delete(position: usize, count: usize, version: u64) -> Self {
        Self {
            position,
            delete: count,
            insert: String::new(),
            version,
        }
    }

    /// Length of the inserted text in code points.
    pub fn insert_len(&self) -> usize {
        self.insert.chars().count()
    }

    /// Net change in document length this transform causes, in code points.
    pub fn length_delta(&self) -> isize {
        self.insert_len() as isize - self.delete as isize
    }
}
