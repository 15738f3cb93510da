//! Local filesystem storage backend.
//!
//! Folders are the directories below a root directory, named by their
//! `/`-separated path relative to that root. Files directly inside the root
//! belong to the [root folder](Folder::root). Hidden entries (leading `.`) are
//! never listed.

use crate::backend::{Capability, FileStream, FolderStream, Storage, mkdirp};
use crate::error::{ErrorKind, Result};
use crate::filter::NameFilters;
use crate::models::{File, Folder};
use crate::path::{display_name, relative};
use async_stream::stream;
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    Directory(PathBuf),
    File(String),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use album_rsync_storage::LocalStorage;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = LocalStorage::new("photos", "/home/me/Pictures")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    name: String,
    /// Root directory; the root folder maps onto it.
    root: PathBuf,
    filters: NameFilters,
}
impl LocalStorage {
    /// Create a new local filesystem storage.
    ///
    /// The root must be absolute. It is created when missing, and must be a
    /// directory when present.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once on start-up; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self {
            name: name.into(),
            root,
            filters: NameFilters::default(),
        })
    }

    pub fn with_filters(mut self, filters: NameFilters) -> Self {
        self.filters = filters;
        self
    }

    fn folder_path(&self, folder_name: &str) -> Result<PathBuf> {
        Ok(self.root.join(relative(folder_name)?))
    }

    fn file_path(&self, folder_name: &str, file_name: &str) -> Result<PathBuf> {
        Ok(self.folder_path(folder_name)?.join(relative(file_name)?))
    }

    fn folder_at(&self, absolute: &Path) -> Result<Folder> {
        let relative = absolute.strip_prefix(&self.root).map_err(|_| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        let name = display_name(relative);
        Ok(Folder::new(name.clone(), name))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Classify one directory entry, keeping the stream loops free of `?`.
    async fn process_entry(entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::warn!(path = %path.display(), "Skipping entry with a non UTF-8 name");
            return Ok(WalkEntry::Skip);
        };
        if name.starts_with('.') {
            return Ok(WalkEntry::Skip);
        }
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Directory(path));
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(name.to_string()));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability<'_> {
        Capability::Local(&self.root)
    }

    fn list_folders(&self) -> FolderStream<'_> {
        let mut stack = vec![self.root.clone()];
        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); break 'entries; },
                    };
                    match Self::process_entry(entry).await {
                        Ok(WalkEntry::Directory(path)) => {
                            match self.folder_at(&path) {
                                Ok(folder) if self.filters.folder(&folder.name) => yield Ok(folder),
                                Ok(_) => {},
                                Err(e) => yield Err(e),
                            }
                            // Excluded folders are still descended into;
                            // their children are matched on their own names.
                            stack.push(path);
                        },
                        Ok(WalkEntry::File(_) | WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    fn list_files<'a>(&'a self, folder: &'a Folder) -> FileStream<'a> {
        Box::pin(stream! {
            let dir = match self.folder_path(&folder.name) {
                Ok(dir) => dir,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) => {
                    yield Err(exn::Exn::from(Self::map_io_error(err, &dir)));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &dir))); break; },
                };
                match Self::process_entry(entry).await {
                    Ok(WalkEntry::File(name)) if self.filters.file(&name) => {
                        let id = display_name(&Path::new(&folder.name).join(&name));
                        yield Ok(File::new(id, name));
                    },
                    Ok(_) => {},
                    Err(e) => yield Err(e),
                };
            }
        })
    }

    async fn copy_file(&self, file: &File, folder_name: &str, dest: &dyn Storage) -> Result<()> {
        let source = self.root.join(relative(&file.id)?);
        match dest.capability() {
            Capability::Local(root) => {
                let target = root.join(relative(folder_name)?).join(relative(&file.name)?);
                mkdirp(&target).await?;
                fs::copy(&source, &target).await.map_err(|e| Self::map_io_error(e, &source))?;
                Ok(())
            },
            Capability::Remote(remote) => {
                remote.upload(&source, folder_name, &file.name, file.checksum.as_deref()).await
            },
        }
    }

    async fn delete_file(&self, file: &File, folder_name: &str) -> Result<()> {
        let path = self.file_path(folder_name, &file.name)?;
        Ok(fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn delete_folder(&self, folder: &Folder) -> Result<()> {
        if folder.is_root() {
            exn::bail!(ErrorKind::NotSupported("deleting the root of a local storage".to_string()));
        }
        let path = self.folder_path(&folder.name)?;
        Ok(fs::remove_dir_all(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}
