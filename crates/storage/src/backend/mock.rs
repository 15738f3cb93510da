//! In-memory storage backend for testing.

use crate::backend::{Capability, FileStream, FolderStream, RemoteStorage, Storage, copy_from_remote};
use crate::error::{ErrorKind, Result};
use crate::filter::NameFilters;
use crate::models::{File, Folder};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tokio::sync::RwLock;

#[derive(Clone)]
struct Entry {
    file: File,
    data: Vec<u8>,
}
impl Entry {
    fn new(file: File) -> Self {
        let data = file.name.clone().into_bytes();
        Self { file, data }
    }
}

#[derive(Default)]
struct State {
    root: Option<Vec<Entry>>,
    folders: Vec<(Folder, Vec<Entry>)>,
}
impl State {
    fn entries(&self, folder_name: &str) -> Option<&Vec<Entry>> {
        match folder_name.is_empty() {
            true => self.root.as_ref(),
            false => self.folders.iter().find(|(f, _)| f.name == folder_name).map(|(_, e)| e),
        }
    }

    fn entries_mut(&mut self, folder_name: &str) -> &mut Vec<Entry> {
        if folder_name.is_empty() {
            return self.root.get_or_insert_with(Vec::new);
        }
        let index = match self.folders.iter().position(|(f, _)| f.name == folder_name) {
            Some(index) => index,
            None => {
                let id = format!("mock-{}", self.folders.len());
                self.folders.push((Folder::new(id, folder_name), Vec::new()));
                self.folders.len() - 1
            },
        };
        &mut self.folders[index].1
    }
}

/// In-memory, remote-capable storage backend.
///
/// Folders and files are declared up front with the builder methods; the
/// contents of a declared file are its name as bytes. Uploads create folders
/// on demand and replace same-named files. A storage built without
/// [`with_root_files()`](Self::with_root_files) behaves like a photo library:
/// listing the root is [`NotSupported`](ErrorKind::NotSupported).
///
/// All state sits behind a [`RwLock`], so every trait method works on `&self`.
pub struct MockStorage {
    name: String,
    filters: NameFilters,
    failing: HashSet<String>,
    state: RwLock<State>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            filters: NameFilters::default(),
            failing: HashSet::new(),
            state: RwLock::new(State::default()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_filters(mut self, filters: NameFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Declare the files at the top level, enabling root listings.
    pub fn with_root_files(mut self, files: impl IntoIterator<Item = File>) -> Self {
        self.state.get_mut().root = Some(files.into_iter().map(Entry::new).collect());
        self
    }

    pub fn with_folder(mut self, folder: Folder, files: impl IntoIterator<Item = File>) -> Self {
        let entries = files.into_iter().map(Entry::new).collect();
        self.state.get_mut().folders.push((folder, entries));
        self
    }

    /// Make every transfer of a file with this name fail with a network error.
    pub fn with_failing_file(mut self, file_name: impl Into<String>) -> Self {
        self.failing.insert(file_name.into());
        self
    }

    /// Names of the files currently stored in `folder_name` (`""` for the root).
    pub async fn file_names(&self, folder_name: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .entries(folder_name)
            .map(|entries| entries.iter().map(|e| e.file.name.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn contents(&self, folder_name: &str, file_name: &str) -> Option<Vec<u8>> {
        let state = self.state.read().await;
        state
            .entries(folder_name)?
            .iter()
            .find(|e| e.file.name == file_name)
            .map(|e| e.data.clone())
    }

    fn check_failing(&self, file_name: &str) -> Result<()> {
        if self.failing.contains(file_name) {
            exn::bail!(ErrorKind::Network(format!("simulated failure for {file_name}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MockStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability<'_> {
        Capability::Remote(self)
    }

    fn list_folders(&self) -> FolderStream<'_> {
        Box::pin(stream! {
            let folders: Vec<Folder> = self.state.read().await.folders.iter().map(|(f, _)| f.clone()).collect();
            for folder in folders {
                if self.filters.folder(&folder.name) {
                    yield Ok(folder);
                }
            }
        })
    }

    fn list_files<'a>(&'a self, folder: &'a Folder) -> FileStream<'a> {
        Box::pin(stream! {
            let entries = {
                let state = self.state.read().await;
                if folder.is_root() {
                    state.root.clone()
                } else {
                    state.folders.iter().find(|(f, _)| f == folder).map(|(_, e)| e.clone())
                }
            };
            let entries = match entries {
                Some(entries) => entries,
                None if folder.is_root() => {
                    yield Err(exn::Exn::from(ErrorKind::NotSupported("mock storage without root files".to_string())));
                    return;
                },
                None => {
                    yield Err(exn::Exn::from(ErrorKind::NotFound(folder.name.clone())));
                    return;
                },
            };
            for entry in entries {
                if self.filters.file(&entry.file.name) {
                    yield Ok(entry.file);
                }
            }
        })
    }

    async fn copy_file(&self, file: &File, folder_name: &str, dest: &dyn Storage) -> Result<()> {
        copy_from_remote(self, file, folder_name, dest).await
    }

    async fn delete_file(&self, file: &File, folder_name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entries = match folder_name.is_empty() {
            true => state.root.as_mut(),
            false => state.folders.iter_mut().find(|(f, _)| f.name == folder_name).map(|(_, e)| e),
        };
        let Some(entries) = entries else {
            exn::bail!(ErrorKind::NotFound(folder_name.to_string()));
        };
        let before = entries.len();
        entries.retain(|e| e.file.name != file.name);
        if entries.len() == before {
            exn::bail!(ErrorKind::NotFound(format!("{folder_name}/{}", file.name)));
        }
        Ok(())
    }

    async fn delete_folder(&self, folder: &Folder) -> Result<()> {
        if folder.is_root() {
            exn::bail!(ErrorKind::NotSupported("deleting the root of a mock storage".to_string()));
        }
        let mut state = self.state.write().await;
        let before = state.folders.len();
        state.folders.retain(|(f, _)| f != folder);
        if state.folders.len() == before {
            exn::bail!(ErrorKind::NotFound(folder.name.clone()));
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl RemoteStorage for MockStorage {
    async fn download(&self, file: &File, dest: &Path) -> Result<()> {
        self.check_failing(&file.name)?;
        let data = {
            let state = self.state.read().await;
            let entries = state.root.iter().chain(state.folders.iter().map(|(_, e)| e));
            let found = entries.flatten().find(|e| e.file.id == file.id).map(|e| e.data.clone());
            match found {
                Some(data) => data,
                None => exn::bail!(ErrorKind::NotFound(file.id.clone())),
            }
        };
        fs::write(dest, data).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn upload(&self, src: &Path, folder_name: &str, file_name: &str, checksum: Option<&str>) -> Result<()> {
        self.check_failing(file_name)?;
        let data = fs::read(src).await.map_err(ErrorKind::Io)?;
        let mut state = self.state.write().await;
        let entries = state.entries_mut(folder_name);
        entries.retain(|e| e.file.name != file_name);
        let id = match folder_name.is_empty() {
            true => file_name.to_string(),
            false => format!("{folder_name}/{file_name}"),
        };
        entries.push(Entry {
            file: File {
                id,
                name: file_name.to_string(),
                checksum: checksum.map(str::to_string),
            },
            data,
        });
        Ok(())
    }
}
