//! Remote photo-album storage backend.
//!
//! Albums are folders and media items are files. The wire protocol of a
//! specific photo service lives behind [`PhotosApi`]; this module turns those
//! primitives into a [`Storage`], sending every API call through a
//! [`Resiliently`] wrapper.
//!
//! Photo libraries have no files outside of albums, and their APIs do not
//! allow deleting media, so those operations fail with
//! [`NotSupported`](ErrorKind::NotSupported).

use crate::backend::{Capability, FileStream, FolderStream, RemoteStorage, Storage, copy_from_remote};
use crate::error::{ErrorKind, Result};
use crate::filter::NameFilters;
use crate::models::{File, Folder};
use album_rsync_resilience::{ResilienceConfig, Resiliently};
use async_stream::stream;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

/// Throttle category shared by every photo API call in the process.
pub const THROTTLE_CATEGORY: &str = "photos-api";

/// An album as returned by the photo service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
}
impl From<Album> for Folder {
    fn from(album: Album) -> Self {
        Folder::new(album.id, album.title)
    }
}

/// A media item (photo or video) as returned by the photo service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub filename: String,
    /// Temporary download URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}
impl From<MediaItem> for File {
    fn from(item: MediaItem) -> Self {
        File {
            id: item.id,
            name: item.filename,
            checksum: item.checksum,
        }
    }
}

/// Primitives a photo service adapter provides.
///
/// Implementations make exactly one request per call and do not retry.
#[async_trait]
pub trait PhotosApi: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<Album>>;

    async fn get_media_in_folder(&self, album_id: &str) -> Result<Vec<MediaItem>>;

    async fn create_album(&self, title: &str) -> Result<Album>;

    /// Upload a local file, adding it to an album when `album_id` is given.
    async fn upload(&self, src: &Path, file_name: &str, album_id: Option<&str>) -> Result<()>;

    /// Fetch the bytes of a media item into the local path `dest`.
    async fn download(&self, media_id: &str, dest: &Path) -> Result<()>;

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

/// Photo service storage.
///
/// Keeps a title → album cache so uploading many files into one album lists
/// the albums at most once and creates the album at most once.
pub struct PhotosStorage<A> {
    name: String,
    api: A,
    filters: NameFilters,
    resiliently: Resiliently,
    albums: Mutex<HashMap<String, Folder>>,
}
impl<A: PhotosApi> PhotosStorage<A> {
    pub fn new(name: impl Into<String>, api: A, resilience: &ResilienceConfig) -> Self {
        Self {
            name: name.into(),
            api,
            filters: NameFilters::default(),
            resiliently: Resiliently::new(THROTTLE_CATEGORY, resilience),
            albums: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_filters(mut self, filters: NameFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn fetch_albums(&self) -> Result<Vec<Album>> {
        let albums = self.resiliently.call(|| self.api.list_albums()).await?;
        let mut cache = self.albums.lock().await;
        for album in &albums {
            cache.entry(album.title.clone()).or_insert_with(|| album.clone().into());
        }
        Ok(albums)
    }

    /// Resolve an album by title: cache, then one listing, then creation.
    async fn album(&self, title: &str) -> Result<Folder> {
        if let Some(folder) = self.albums.lock().await.get(title) {
            return Ok(folder.clone());
        }
        self.fetch_albums().await?;
        let mut cache = self.albums.lock().await;
        if let Some(folder) = cache.get(title) {
            return Ok(folder.clone());
        }
        let created: Folder = self.resiliently.call(|| self.api.create_album(title)).await?.into();
        tracing::info!(storage = self.name.as_str(), album = title, "Created album");
        cache.insert(title.to_string(), created.clone());
        Ok(created)
    }
}

#[async_trait]
impl<A: PhotosApi> Storage for PhotosStorage<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability<'_> {
        Capability::Remote(self)
    }

    fn list_folders(&self) -> FolderStream<'_> {
        Box::pin(stream! {
            let albums = match self.fetch_albums().await {
                Ok(albums) => albums,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for album in albums {
                if self.filters.folder(&album.title) {
                    yield Ok(album.into());
                }
            }
        })
    }

    fn list_files<'a>(&'a self, folder: &'a Folder) -> FileStream<'a> {
        Box::pin(stream! {
            let Some(album_id) = folder.backend_id() else {
                yield Err(exn::Exn::from(ErrorKind::NotSupported("photo libraries have no files outside albums".to_string())));
                return;
            };
            let media = match self.resiliently.call(|| self.api.get_media_in_folder(album_id)).await {
                Ok(media) => media,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for item in media {
                if self.filters.file(&item.filename) {
                    yield Ok(item.into());
                }
            }
        })
    }

    async fn copy_file(&self, file: &File, folder_name: &str, dest: &dyn Storage) -> Result<()> {
        copy_from_remote(self, file, folder_name, dest).await
    }

    async fn delete_file(&self, _file: &File, _folder_name: &str) -> Result<()> {
        exn::bail!(ErrorKind::NotSupported("deleting media from a photo library".to_string()))
    }

    async fn delete_folder(&self, _folder: &Folder) -> Result<()> {
        exn::bail!(ErrorKind::NotSupported("deleting albums from a photo library".to_string()))
    }

    async fn logout(&self) -> Result<()> {
        self.resiliently.call(|| self.api.logout()).await
    }
}

#[async_trait]
impl<A: PhotosApi> RemoteStorage for PhotosStorage<A> {
    async fn download(&self, file: &File, dest: &Path) -> Result<()> {
        self.resiliently.call(|| self.api.download(&file.id, dest)).await
    }

    async fn upload(&self, src: &Path, folder_name: &str, file_name: &str, _checksum: Option<&str>) -> Result<()> {
        let album = match folder_name.is_empty() {
            true => None,
            false => Some(self.album(folder_name).await?),
        };
        let album_id = album.as_ref().and_then(Folder::backend_id);
        self.resiliently.call(|| self.api.upload(src, file_name, album_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalStorage;
    use crate::filter::Filter;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Upload {
        src: PathBuf,
        file_name: String,
        album_id: Option<String>,
        src_existed: bool,
    }

    /// Records every call; failures can be injected per operation.
    #[derive(Default)]
    struct RecordingApi {
        albums: Vec<Album>,
        media: HashMap<String, Vec<MediaItem>>,
        created: Option<Album>,
        list_albums_calls: AtomicUsize,
        create_album_calls: AtomicUsize,
        download_calls: AtomicUsize,
        logout_calls: AtomicUsize,
        uploads: SyncMutex<Vec<Upload>>,
        failing_list_albums: AtomicUsize,
        failing_logouts: AtomicUsize,
        fail_uploads: bool,
        fail_downloads: bool,
    }

    #[async_trait]
    impl PhotosApi for RecordingApi {
        async fn list_albums(&self) -> Result<Vec<Album>> {
            self.list_albums_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failing_list_albums.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_list_albums.store(remaining - 1, Ordering::SeqCst);
                exn::bail!(ErrorKind::Network("connection reset".to_string()));
            }
            Ok(self.albums.clone())
        }

        async fn get_media_in_folder(&self, album_id: &str) -> Result<Vec<MediaItem>> {
            Ok(self.media.get(album_id).cloned().unwrap_or_default())
        }

        async fn create_album(&self, title: &str) -> Result<Album> {
            self.create_album_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.created.clone().unwrap_or_else(|| Album {
                id: format!("new-{title}"),
                title: title.to_string(),
            }))
        }

        async fn upload(&self, src: &Path, file_name: &str, album_id: Option<&str>) -> Result<()> {
            self.uploads.lock().unwrap().push(Upload {
                src: src.to_path_buf(),
                file_name: file_name.to_string(),
                album_id: album_id.map(str::to_string),
                src_existed: src.exists(),
            });
            if self.fail_uploads {
                exn::bail!(ErrorKind::Network("upload rejected".to_string()));
            }
            Ok(())
        }

        async fn download(&self, media_id: &str, dest: &Path) -> Result<()> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_downloads {
                exn::bail!(ErrorKind::Network("download interrupted".to_string()));
            }
            tokio::fs::write(dest, format!("bytes of {media_id}")).await.map_err(ErrorKind::Io)?;
            Ok(())
        }

        async fn logout(&self) -> Result<()> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failing_logouts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_logouts.store(remaining - 1, Ordering::SeqCst);
                exn::bail!(ErrorKind::Network("session expired".to_string()));
            }
            Ok(())
        }
    }

    fn albums_fixture() -> Vec<Album> {
        serde_json::from_value(json!([
            { "id": "123", "title": "Folder 1" },
            { "id": "456", "title": "Folder 2" },
        ]))
        .unwrap()
    }

    fn media_fixture() -> Vec<MediaItem> {
        serde_json::from_value(json!([
            { "id": "123", "filename": "image1.jpg", "baseUrl": "https://example.com" },
            { "id": "456", "filename": "image2.jpg", "baseUrl": "https://example.com" },
        ]))
        .unwrap()
    }

    fn no_delays() -> ResilienceConfig {
        ResilienceConfig {
            throttle: Duration::ZERO,
            retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn storage(api: RecordingApi) -> PhotosStorage<RecordingApi> {
        PhotosStorage::new("photos", api, &no_delays())
    }

    fn with_albums() -> RecordingApi {
        RecordingApi {
            albums: albums_fixture(),
            ..Default::default()
        }
    }

    fn with_media() -> RecordingApi {
        RecordingApi {
            media: HashMap::from([("123".to_string(), media_fixture())]),
            ..Default::default()
        }
    }

    fn folder_filters(include: Option<&str>, exclude: Option<&str>) -> NameFilters {
        NameFilters::new(Filter::default(), Filter::new(include, exclude).unwrap())
    }

    fn file_filters(include: Option<&str>, exclude: Option<&str>) -> NameFilters {
        NameFilters::new(Filter::new(include, exclude).unwrap(), Filter::default())
    }

    #[test]
    fn test_media_item_deserializes_service_json() {
        let item: MediaItem = serde_json::from_value(json!({
            "id": "1", "filename": "a.jpg", "baseUrl": "https://example.com/a", "checksum": "abc"
        }))
        .unwrap();
        assert_eq!(item.base_url.as_deref(), Some("https://example.com/a"));
        let file = File::from(item);
        assert_eq!(file.name, "a.jpg");
        assert_eq!(file.checksum.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_list_folders_returns_albums() {
        let folders = storage(with_albums()).folders().await.unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0], Folder::new("123", "Folder 1"));
    }

    #[tokio::test]
    async fn test_list_folders_excludes() {
        let storage = storage(with_albums()).with_filters(folder_filters(None, Some("Folder 1")));
        let folders = storage.folders().await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "Folder 2");
    }

    #[tokio::test]
    async fn test_list_folders_includes() {
        let storage = storage(with_albums()).with_filters(folder_filters(Some("Folder 1"), None));
        let folders = storage.folders().await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "Folder 1");
    }

    #[tokio::test]
    async fn test_list_folders_empty() {
        assert!(storage(RecordingApi::default()).folders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_files_returns_media_in_order() {
        let files = storage(with_media()).files(&Folder::new("123", "test")).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["image1.jpg", "image2.jpg"]);
        assert_eq!(files[0].id, "123");
    }

    #[tokio::test]
    async fn test_list_files_in_root_is_not_supported() {
        let err = storage(with_media()).files(&Folder::root()).await.unwrap_err();
        assert!(err.is_not_supported());
    }

    #[tokio::test]
    async fn test_list_files_excludes() {
        let storage = storage(with_media()).with_filters(file_filters(None, Some("image1")));
        let files = storage.files(&Folder::new("123", "test")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "image2.jpg");
    }

    #[tokio::test]
    async fn test_list_files_includes() {
        let storage = storage(with_media()).with_filters(file_filters(Some("image1"), None));
        let files = storage.files(&Folder::new("123", "test")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "image1.jpg");
    }

    #[tokio::test]
    async fn test_list_files_empty() {
        assert!(storage(with_media()).files(&Folder::new("789", "empty")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_uses_albums_cached_by_listing() {
        let storage = storage(with_albums());
        storage.folders().await.unwrap();
        storage.upload(Path::new("/"), "Folder 1", "micky.jpg", None).await.unwrap();
        let api = storage.api();
        assert_eq!(api.list_albums_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.create_album_calls.load(Ordering::SeqCst), 0);
        let uploads = api.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].src, Path::new("/"));
        assert_eq!(uploads[0].file_name, "micky.jpg");
        assert_eq!(uploads[0].album_id.as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn test_upload_lists_albums_on_cache_miss() {
        let storage = storage(with_albums());
        storage.upload(Path::new("/"), "Folder 1", "micky.jpg", None).await.unwrap();
        let api = storage.api();
        assert_eq!(api.list_albums_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.create_album_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.uploads.lock().unwrap()[0].album_id.as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn test_upload_creates_missing_album() {
        let storage = storage(RecordingApi {
            created: Some(albums_fixture().remove(0)),
            ..Default::default()
        });
        storage.upload(Path::new("/"), "Folder 1", "micky.jpg", None).await.unwrap();
        let api = storage.api();
        assert_eq!(api.list_albums_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.create_album_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.uploads.lock().unwrap()[0].album_id.as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn test_repeated_uploads_list_and_create_once() {
        let storage = storage(RecordingApi::default());
        for n in 0..4 {
            storage.upload(Path::new("/"), "New Album", &format!("{n}.jpg"), None).await.unwrap();
        }
        let api = storage.api();
        assert_eq!(api.list_albums_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.create_album_calls.load(Ordering::SeqCst), 1);
        let uploads = api.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 4);
        assert!(uploads.iter().all(|u| u.album_id.as_deref() == Some("new-New Album")));
    }

    #[tokio::test]
    async fn test_upload_without_folder_skips_albums() {
        let storage = storage(with_albums());
        storage.upload(Path::new("/"), "", "loose.jpg", None).await.unwrap();
        let api = storage.api();
        assert_eq!(api.list_albums_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.uploads.lock().unwrap()[0].album_id, None);
    }

    #[tokio::test]
    async fn test_remote_to_remote_copy_stages_and_cleans_up() {
        let source = storage(with_media());
        let dest = storage(with_albums());
        let file = File::new("123", "image1.jpg");
        source.copy_file(&file, "Folder 2", &dest).await.unwrap();
        assert_eq!(source.api().download_calls.load(Ordering::SeqCst), 1);
        let uploads = dest.api().uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].file_name, "image1.jpg");
        assert_eq!(uploads[0].album_id.as_deref(), Some("456"));
        assert!(uploads[0].src_existed);
        assert!(!uploads[0].src.exists());
    }

    #[tokio::test]
    async fn test_remote_to_remote_copy_cleans_up_after_failed_upload() {
        let source = storage(with_media());
        let dest = storage(RecordingApi {
            albums: albums_fixture(),
            fail_uploads: true,
            ..Default::default()
        });
        let file = File::new("123", "image1.jpg");
        let err = source.copy_file(&file, "Folder 2", &dest).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(source.api().download_calls.load(Ordering::SeqCst), 1);
        let uploads = dest.api().uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert!(!uploads[0].src.exists());
    }

    #[tokio::test]
    async fn test_remote_to_remote_copy_stops_after_failed_download() {
        let source = storage(RecordingApi {
            fail_downloads: true,
            ..Default::default()
        });
        let dest = storage(with_albums());
        let err = source.copy_file(&File::new("123", "image1.jpg"), "Folder 2", &dest).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert!(dest.api().uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_to_local_copy_downloads_in_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = storage(with_media());
        let dest = LocalStorage::new("local", temp_dir.path()).unwrap();
        source.copy_file(&File::new("123", "image1.jpg"), "Folder 1", &dest).await.unwrap();
        let contents = std::fs::read_to_string(temp_dir.path().join("Folder 1/image1.jpg")).unwrap();
        assert_eq!(contents, "bytes of 123");
        assert_eq!(source.api().download_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_to_remote_copy_uploads_source_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("Folder 1")).unwrap();
        std::fs::write(temp_dir.path().join("Folder 1/a.jpg"), "a").unwrap();
        let source = LocalStorage::new("local", temp_dir.path()).unwrap();
        let dest = storage(with_albums());
        source.copy_file(&File::new("Folder 1/a.jpg", "a.jpg"), "Folder 1", &dest).await.unwrap();
        let uploads = dest.api().uploads.lock().unwrap();
        assert_eq!(uploads[0].src, temp_dir.path().join("Folder 1/a.jpg"));
        assert_eq!(uploads[0].album_id.as_deref(), Some("123"));
    }

    #[tokio::test]
    async fn test_api_calls_are_retried() {
        let api = RecordingApi {
            albums: albums_fixture(),
            failing_list_albums: AtomicUsize::new(2),
            ..Default::default()
        };
        let storage = PhotosStorage::new("photos", api, &ResilienceConfig { retries: 2, ..no_delays() });
        assert_eq!(storage.folders().await.unwrap().len(), 2);
        assert_eq!(storage.api().list_albums_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_api_failure_surfaces_after_retries() {
        let api = RecordingApi {
            failing_list_albums: AtomicUsize::new(5),
            ..Default::default()
        };
        let storage = PhotosStorage::new("photos", api, &ResilienceConfig { retries: 1, ..no_delays() });
        let err = storage.folders().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(storage.api().list_albums_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logout_is_retried() {
        let api = RecordingApi {
            failing_logouts: AtomicUsize::new(1),
            ..Default::default()
        };
        let storage = PhotosStorage::new("photos", api, &ResilienceConfig { retries: 1, ..no_delays() });
        storage.logout().await.unwrap();
        assert_eq!(storage.api().logout_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logout_failure_surfaces() {
        let storage = storage(RecordingApi {
            failing_logouts: AtomicUsize::new(1),
            ..Default::default()
        });
        let err = storage.logout().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(storage.api().logout_calls.load(Ordering::SeqCst), 1);
    }

    // Only test with a non-zero throttle: the spacing is shared process-wide.
    #[tokio::test(start_paused = true)]
    async fn test_api_calls_are_throttled_across_instances() {
        let resilience = ResilienceConfig {
            throttle: Duration::from_secs(2),
            ..no_delays()
        };
        let first = PhotosStorage::new("first", with_albums(), &resilience);
        let second = PhotosStorage::new("second", with_albums(), &resilience);
        let started = tokio::time::Instant::now();
        first.folders().await.unwrap();
        second.folders().await.unwrap();
        first.logout().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(first.api().list_albums_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.api().list_albums_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.api().logout_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deletes_are_not_supported() {
        let storage = storage(with_albums());
        let file = File::new("1", "a.jpg");
        assert!(storage.delete_file(&file, "Folder 1").await.unwrap_err().is_not_supported());
        assert!(storage.delete_folder(&Folder::new("123", "Folder 1")).await.unwrap_err().is_not_supported());
    }
}
