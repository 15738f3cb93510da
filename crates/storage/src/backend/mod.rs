//! Storage traits and implementations.
//!
//! [`Storage`] is the capability set every backend implements: enumerate
//! folders, enumerate the files in a folder, copy a file into another storage,
//! delete, and release the session. Backends that can move bytes to and from
//! the local filesystem on their own (remote services) also implement
//! [`RemoteStorage`], and share one cross-backend copy algorithm,
//! [`copy_from_remote`].
//!
//! Which algorithm a copy uses is decided by the *destination's*
//! [`Capability`], not by its concrete type.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod photos;

pub use self::local::LocalStorage;
#[cfg(feature = "mock")]
pub use self::mock::MockStorage;
pub use self::photos::{Album, MediaItem, PhotosApi, PhotosStorage, THROTTLE_CATEGORY};
use crate::error::{ErrorKind, Result};
use crate::models::{File, Folder};
use crate::path::relative;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;
use tempfile::NamedTempFile;
use tokio::fs;

pub type FolderStream<'a> = Pin<Box<dyn Stream<Item = Result<Folder>> + Send + 'a>>;
pub type FileStream<'a> = Pin<Box<dyn Stream<Item = Result<File>> + Send + 'a>>;

/// How a storage can receive files, used to pick a copy strategy.
#[derive(Clone, Copy)]
pub enum Capability<'a> {
    /// Plain directory tree rooted at the given path.
    Local(&'a Path),
    /// Backend with its own upload/download primitives.
    Remote(&'a dyn RemoteStorage),
}

/// Unified interface for storage backends.
///
/// Listing is lazy: both listings return [`Stream`]s that fetch and filter as
/// they are polled. Each backend applies its own configured
/// [`NameFilters`](crate::NameFilters) before yielding.
///
/// Backend failures are returned as-is; retrying is the job of the
/// [`Resiliently`](album_rsync_resilience::Resiliently) wrapper a backend is
/// built around, not of the caller.
///
/// # Examples
///
/// ```
/// use futures::TryStreamExt;
/// use album_rsync_storage::{Storage, error::Result};
///
/// async fn count_files(storage: &dyn Storage) -> Result<usize> {
///     let mut count = 0;
///     let mut folders = storage.list_folders();
///     while let Some(folder) = folders.try_next().await? {
///         count += storage.files(&folder).await?.len();
///     }
///     Ok(count)
/// }
/// ```
#[async_trait]
pub trait Storage: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    fn capability(&self) -> Capability<'_>;

    /// Stream every folder whose name passes the folder filter.
    ///
    /// The root sentinel is never part of this listing.
    fn list_folders(&self) -> FolderStream<'_>;

    /// Stream the files in `folder` whose names pass the file filter, in
    /// backend order.
    ///
    /// Backends without files at their top level yield a single
    /// [`NotSupported`](ErrorKind::NotSupported) error for
    /// [`Folder::root()`] rather than an empty stream.
    fn list_files<'a>(&'a self, folder: &'a Folder) -> FileStream<'a>;

    /// Convenience wrapper collecting [`list_folders()`](Self::list_folders).
    async fn folders(&self) -> Result<Vec<Folder>> {
        self.list_folders().try_collect().await
    }

    /// Convenience wrapper collecting [`list_files()`](Self::list_files).
    async fn files(&self, folder: &Folder) -> Result<Vec<File>> {
        self.list_files(folder).try_collect().await
    }

    /// Materialise `file` in `dest` as `<folder_name>/<file.name>`,
    /// overwriting whatever has that name already.
    async fn copy_file(&self, file: &File, folder_name: &str, dest: &dyn Storage) -> Result<()>;

    async fn delete_file(&self, file: &File, folder_name: &str) -> Result<()>;

    /// Delete a folder along with its contents.
    async fn delete_folder(&self, folder: &Folder) -> Result<()>;

    /// Release any session held with the backend.
    async fn logout(&self) -> Result<()>;
}

/// A storage that can transfer single files to and from local paths.
#[async_trait]
pub trait RemoteStorage: Storage {
    /// Write the contents of `file` to the local path `dest`.
    async fn download(&self, file: &File, dest: &Path) -> Result<()>;

    /// Store the local file `src` as `file_name` inside the folder called
    /// `folder_name`, creating the folder if needed. An empty folder name
    /// means the top level.
    async fn upload(&self, src: &Path, folder_name: &str, file_name: &str, checksum: Option<&str>) -> Result<()>;
}

/// Copy a file out of a remote storage.
///
/// - Into another remote storage: stage through a private temporary file,
///   which is removed on every exit path (including failed transfers).
/// - Into a local storage: download straight to
///   `<root>/<folder_name>/<file.name>`.
pub async fn copy_from_remote(
    source: &dyn RemoteStorage,
    file: &File,
    folder_name: &str,
    dest: &dyn Storage,
) -> Result<()> {
    match dest.capability() {
        Capability::Remote(remote) => {
            let staging = NamedTempFile::new().map_err(ErrorKind::Io)?;
            tracing::debug!(
                source = source.name(),
                dest = dest.name(),
                file = %file.name,
                staging = %staging.path().display(),
                "Staging file for remote-to-remote copy"
            );
            source.download(file, staging.path()).await?;
            remote.upload(staging.path(), folder_name, &file.name, file.checksum.as_deref()).await?;
            staging.close().map_err(ErrorKind::Io)?;
            Ok(())
        },
        Capability::Local(root) => {
            let target = root.join(relative(folder_name)?).join(relative(&file.name)?);
            mkdirp(&target).await?;
            source.download(file, &target).await
        },
    }
}

/// Create every missing ancestor directory of `path`.
///
/// The final component is left alone (it is usually a file about to be
/// written), and existing directories are not an error.
pub async fn mkdirp(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?),
        _ => Ok(()),
    }
}
