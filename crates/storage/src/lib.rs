//! Album storage: folders of files behind a common [`Storage`] interface.
//!
//! Backends list folders and files lazily, apply their configured
//! [`NameFilters`], and know how to copy a single file into any other
//! storage. Remote backends route every call through
//! [`album_rsync_resilience::Resiliently`].

pub mod backend;
pub mod error;
mod filter;
mod models;
mod path;

#[cfg(feature = "mock")]
pub use crate::backend::MockStorage;
pub use crate::backend::{
    Album, Capability, FileStream, FolderStream, LocalStorage, MediaItem, PhotosApi, PhotosStorage, RemoteStorage,
    Storage, THROTTLE_CATEGORY, copy_from_remote, mkdirp,
};
pub use crate::filter::{Filter, NameFilters};
pub use crate::models::{File, Folder, FolderId};
pub use crate::path::relative as relative_path;
