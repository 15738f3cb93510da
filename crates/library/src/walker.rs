//! ASCII tree listing of a storage.
//!
//! Folders are printed at the top level with their files nested beneath
//! them, in the style of `tree(1)`:
//!
//! ```text
//! ├─── C File [abc123]
//! │   
//! ├─── A Folder
//! │   └─── A File
//! │   
//! └─── B Folder
//!     └─── B File
//! ```
//!
//! Whether a block is the last one is only known once the next *printed*
//! block turns up (empty folders are hidden), so rendering runs one block
//! behind enumeration.

use crate::error::{ErrorKind, Result};
use album_rsync_storage::{File, Folder, FolderStream, Storage};
use exn::ResultExt;
use futures::TryStreamExt;
use futures::stream;
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;

const BRANCH: &str = "├─── ";
const LAST: &str = "└─── ";
const PIPE: &str = "│   ";
const BLANK: &str = "    ";

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// List files stored directly in the storage root.
    pub root_files: bool,
    /// List only the root's files and no folders at all.
    pub root_only: bool,
    /// List folder names only, without enumerating their files.
    pub folders_only: bool,
    /// Sort folders and files by name instead of keeping backend order.
    pub sort: bool,
}

/// Counts gathered by a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub directories: u64,
    pub files: u64,
    pub empty_directories: u64,
    pub folders_only: bool,
    pub elapsed: Duration,
}
impl fmt::Display for WalkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        if self.folders_only {
            return write!(f, "{} directories read in {secs} sec", self.directories);
        }
        write!(f, "{} directories, {} files", self.directories, self.files)?;
        if self.empty_directories > 0 {
            write!(f, " (excluding {} empty directories)", self.empty_directories)?;
        }
        write!(f, " read in {secs} sec")
    }
}

enum Block {
    Root(Vec<File>),
    /// `None` in folders-only mode.
    Folder(Folder, Option<Vec<File>>),
}

pub struct TreeWalker<'a, W> {
    storage: &'a dyn Storage,
    options: WalkOptions,
    out: W,
}

impl<'a, W: Write> TreeWalker<'a, W> {
    pub fn new(storage: &'a dyn Storage, options: WalkOptions, out: W) -> Self {
        Self { storage, options, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print the whole tree and return what was counted.
    #[tracing::instrument(skip_all, fields(storage = self.storage.name()))]
    pub async fn walk(&mut self) -> Result<WalkSummary> {
        let started = Instant::now();
        let options = self.options;
        let mut summary = WalkSummary {
            folders_only: options.folders_only,
            ..WalkSummary::default()
        };
        let mut pending = None;

        if (options.root_files || options.root_only) && !options.folders_only {
            let files = self.root_files().await?;
            if !files.is_empty() {
                summary.files += files.len() as u64;
                pending = Some(Block::Root(files));
            }
        }

        if !options.root_only {
            let mut folders = self.folders().await?;
            while let Some(folder) = folders.try_next().await.or_raise(|| ErrorKind::Storage)? {
                if folder.is_root() {
                    continue;
                }
                let block = match options.folders_only {
                    true => Block::Folder(folder, None),
                    false => {
                        let files = self.files(&folder).await?;
                        if files.is_empty() {
                            tracing::debug!(folder = %folder.name, "Hiding empty folder");
                            summary.empty_directories += 1;
                            continue;
                        }
                        summary.files += files.len() as u64;
                        Block::Folder(folder, Some(files))
                    },
                };
                summary.directories += 1;
                if let Some(previous) = pending.replace(block) {
                    self.render(&previous, false)?;
                }
            }
        }

        if let Some(last) = pending {
            self.render(&last, true)?;
        }
        summary.elapsed = started.elapsed();
        tracing::info!("{summary}");
        Ok(summary)
    }

    async fn folders(&self) -> Result<FolderStream<'a>> {
        let storage = self.storage;
        if !self.options.sort {
            return Ok(storage.list_folders());
        }
        let mut folders = storage.folders().await.or_raise(|| ErrorKind::Storage)?;
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Box::pin(stream::iter(folders.into_iter().map(Ok))))
    }

    async fn root_files(&self) -> Result<Vec<File>> {
        let files = match self.storage.files(&Folder::root()).await {
            Err(e) if e.is_not_supported() => {
                tracing::debug!(storage = self.storage.name(), "Storage has no root files");
                Vec::new()
            },
            result => result.or_raise(|| ErrorKind::Storage)?,
        };
        Ok(self.sorted(files))
    }

    async fn files(&self, folder: &Folder) -> Result<Vec<File>> {
        let files = self.storage.files(folder).await.or_raise(|| ErrorKind::Storage)?;
        Ok(self.sorted(files))
    }

    fn sorted(&self, mut files: Vec<File>) -> Vec<File> {
        if self.options.sort {
            files.sort_by(|a, b| a.name.cmp(&b.name));
        }
        files
    }

    fn render(&mut self, block: &Block, last: bool) -> Result<()> {
        match block {
            Block::Root(files) => {
                for (i, file) in files.iter().enumerate() {
                    let connector = if last && i + 1 == files.len() { LAST } else { BRANCH };
                    self.line(format_args!("{connector}{}", Label(file)))?;
                }
            },
            Block::Folder(folder, files) => {
                let (connector, indent) = if last { (LAST, BLANK) } else { (BRANCH, PIPE) };
                self.line(format_args!("{connector}{}", folder.name))?;
                let Some(files) = files else {
                    return Ok(());
                };
                for (i, file) in files.iter().enumerate() {
                    let connector = if i + 1 == files.len() { LAST } else { BRANCH };
                    self.line(format_args!("{indent}{connector}{}", Label(file)))?;
                }
            },
        }
        if !last {
            self.line(format_args!("{PIPE}"))?;
        }
        Ok(())
    }

    fn line(&mut self, line: fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.out, "{line}").or_raise(|| ErrorKind::Output)
    }
}

/// File name, with the checksum in brackets when there is one.
struct Label<'a>(&'a File);
impl fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.checksum {
            Some(checksum) => write!(f, "{} [{checksum}]", self.0.name),
            None => f.write_str(&self.0.name),
        }
    }
}
