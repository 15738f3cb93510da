//! Storage models.
//!
//! Immutable snapshots handed out by backends while enumerating. Nothing holds
//! references back into the backend, and nothing is persisted.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Backend-opaque folder identifier.
///
/// The root sentinel is a distinct variant so it can never collide with an
/// identifier handed out by a real backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderId {
    /// The backend's top-level container ("no subfolder").
    Root,
    Id(String),
}
impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<root>"),
            Self::Id(id) => f.write_str(id),
        }
    }
}

/// A folder (album, directory) within a backend.
///
/// Two folders are equal when their identifiers are equal; the name is only
/// used for matching, sorting and display (and, for local storage, as the
/// relative sub-path).
#[derive(Debug, Clone)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
}
impl Folder {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: FolderId::Id(id.into()),
            name: name.into(),
        }
    }

    /// The sentinel folder representing the backend's top level.
    pub fn root() -> Self {
        Self {
            id: FolderId::Root,
            name: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == FolderId::Root
    }

    /// The backend's own identifier, or `None` for the root sentinel.
    pub fn backend_id(&self) -> Option<&str> {
        match &self.id {
            FolderId::Root => None,
            FolderId::Id(id) => Some(id),
        }
    }
}
impl PartialEq for Folder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Folder {}
impl Hash for Folder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A file (photo, video, document) within a folder.
#[derive(Debug, Clone)]
pub struct File {
    pub id: String,
    pub name: String,
    /// Content hash, when the backend exposes one.
    pub checksum: Option<String>,
}
impl File {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}
impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for File {}
