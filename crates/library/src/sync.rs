//! One-way sync of every folder and file from one storage into another.

use crate::error::{ErrorKind, Result};
use album_rsync_storage::error::ErrorKind as StorageErrorKind;
use album_rsync_storage::{Capability, File, Folder, Storage};
use exn::ResultExt;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Also copy the files stored directly in the source root.
    pub root_files: bool,
    /// Decide and log every copy without performing it.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub folders: u64,
    pub copied: u64,
    pub skipped: u64,
    pub dry_run: bool,
    pub elapsed: Duration,
}
impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "to copy" } else { "copied" };
        write!(
            f,
            "{} directories, {} files {verb}, {} files skipped in {} sec",
            self.folders,
            self.copied,
            self.skipped,
            self.elapsed.as_secs()
        )
    }
}

/// Checksums of the files already in one destination folder, by name.
type Existing = HashMap<String, Option<String>>;

/// Copy everything `source` lists into `dest`, skipping files that are
/// already there.
///
/// A file is considered present when the destination folder of the same name
/// holds a file of the same name, unless both sides report checksums and
/// they differ. Folders are processed one at a time in source order and the
/// first failure aborts the run. Source folders sharing a name are merged into
/// one destination folder.
#[tracing::instrument(skip_all, fields(source = source.name(), dest = dest.name()))]
pub async fn sync(source: &dyn Storage, dest: &dyn Storage, options: SyncOptions) -> Result<SyncSummary> {
    let started = Instant::now();
    let mut summary = SyncSummary {
        dry_run: options.dry_run,
        ..SyncSummary::default()
    };
    let dest_folders: HashMap<String, Folder> = dest
        .folders()
        .await
        .or_raise(|| ErrorKind::Storage)?
        .into_iter()
        .map(|folder| (folder.name.clone(), folder))
        .collect();

    if options.root_files {
        let files = root_files(source).await?;
        if !files.is_empty() {
            let mut existing = existing_files(dest, "", Some(&Folder::root())).await?;
            sync_files(source, dest, "", &files, &mut existing, options, &mut summary).await?;
        }
    }

    let mut synced: HashMap<String, Existing> = HashMap::new();
    let mut folders = source.list_folders();
    while let Some(folder) = folders.try_next().await.or_raise(|| ErrorKind::Storage)? {
        if folder.is_root() {
            continue;
        }
        summary.folders += 1;
        let files = source.files(&folder).await.or_raise(|| ErrorKind::Storage)?;
        let mut existing = match synced.remove(&folder.name) {
            Some(existing) => {
                tracing::warn!(folder = %folder.name, "Duplicate folder name; merging into one destination folder");
                existing
            },
            None => existing_files(dest, &folder.name, dest_folders.get(&folder.name)).await?,
        };
        tracing::debug!(folder = %folder.name, files = files.len(), existing = existing.len(), "Syncing folder");
        sync_files(source, dest, &folder.name, &files, &mut existing, options, &mut summary).await?;
        synced.insert(folder.name, existing);
    }

    summary.elapsed = started.elapsed();
    tracing::info!("{summary}");
    Ok(summary)
}

async fn sync_files(
    source: &dyn Storage,
    dest: &dyn Storage,
    folder_name: &str,
    files: &[File],
    existing: &mut Existing,
    options: SyncOptions,
    summary: &mut SyncSummary,
) -> Result<()> {
    for file in files {
        if is_present(file, existing) {
            tracing::trace!(folder = folder_name, file = %file.name, "Already present");
            summary.skipped += 1;
            continue;
        }
        if options.dry_run {
            tracing::info!(folder = folder_name, file = %file.name, "Would copy");
        } else {
            source.copy_file(file, folder_name, dest).await.or_raise(|| ErrorKind::Storage)?;
            tracing::info!(folder = folder_name, file = %file.name, "Copied");
        }
        existing.insert(file.name.clone(), file.checksum.clone());
        summary.copied += 1;
    }
    Ok(())
}

fn is_present(file: &File, existing: &Existing) -> bool {
    match (existing.get(&file.name), &file.checksum) {
        (None, _) => false,
        (Some(Some(theirs)), Some(ours)) => theirs == ours,
        (Some(_), _) => true,
    }
}

async fn root_files(storage: &dyn Storage) -> Result<Vec<File>> {
    match storage.files(&Folder::root()).await {
        Err(e) if e.is_not_supported() => Ok(Vec::new()),
        result => result.or_raise(|| ErrorKind::Storage),
    }
}

/// Local listings hide dot-prefixed directories, so a folder missing from the
/// destination listing may still exist on disk under its name.
async fn existing_files(dest: &dyn Storage, name: &str, folder: Option<&Folder>) -> Result<Existing> {
    let files = match (folder, dest.capability()) {
        (Some(folder), _) if folder.is_root() => root_files(dest).await?,
        (Some(folder), _) => dest.files(folder).await.or_raise(|| ErrorKind::Storage)?,
        (None, Capability::Local(_)) => unlisted_files(dest, name).await?,
        (None, Capability::Remote(_)) => Vec::new(),
    };
    Ok(files.into_iter().map(|f| (f.name, f.checksum)).collect())
}

async fn unlisted_files(dest: &dyn Storage, name: &str) -> Result<Vec<File>> {
    match dest.files(&Folder::new(name, name)).await {
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => Ok(Vec::new()),
        result => result.or_raise(|| ErrorKind::Storage),
    }
}
