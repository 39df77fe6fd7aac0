//! Fixtures shared by the unit tests in this crate.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use gallery_blob::{BlobError, BlobStore, LocalBlobStore};
use gallery_db::Database;

use crate::state::{AppState, AppStateInner};
use crate::token::TokenIssuer;
use crate::validate::{ImageType, PhotoFile};

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_MAX_FILE_SIZE: usize = 1024 * 1024;

pub struct TestGallery {
    _dir: TempDir,
    pub blob_dir: PathBuf,
    pub state: AppState,
}

impl TestGallery {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let blob_dir = dir.path().join("uploads");
        let blobs = LocalBlobStore::new(blob_dir.clone(), "http://localhost:5000/uploads")
            .await
            .unwrap();
        Self::build(dir, blob_dir, Arc::new(blobs))
    }

    pub async fn with_blobs(blobs: Arc<dyn BlobStore>) -> Self {
        let dir = TempDir::new().unwrap();
        let blob_dir = dir.path().join("uploads");
        Self::build(dir, blob_dir, blobs)
    }

    fn build(dir: TempDir, blob_dir: PathBuf, blobs: Arc<dyn BlobStore>) -> Self {
        let db = Database::open(&dir.path().join("gallery.db")).unwrap();
        let state = AppStateInner::new(
            Arc::new(db),
            blobs,
            TokenIssuer::new(TEST_SECRET, Duration::days(7)),
            TEST_MAX_FILE_SIZE,
        );
        Self {
            _dir: dir,
            blob_dir,
            state,
        }
    }

    /// Insert a user directly, skipping password hashing.
    pub fn user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let email = format!("{}-{}@example.com", name.to_lowercase(), id);
        self.state
            .db
            .create_user(&id.to_string(), name, &email, "$argon2id$unused")
            .unwrap();
        id
    }

    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(&self.blob_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn jpeg() -> PhotoFile {
    PhotoFile {
        file_name: "sunset.jpg".into(),
        image_type: ImageType::Jpeg,
        data: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F']),
    }
}

/// A blob store whose every call fails.
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, _key: &str, _data: Bytes, _content_type: &str) -> gallery_blob::Result<String> {
        Err(BlobError::Rejected {
            status: 503,
            body: "unavailable".into(),
        })
    }

    async fn delete(&self, _url: &str) -> gallery_blob::Result<()> {
        Err(BlobError::Rejected {
            status: 503,
            body: "unavailable".into(),
        })
    }
}
