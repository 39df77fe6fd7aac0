use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::{BlobEntry, BlobError, BlobStore, Result, validate_key};

/// Blob store backed by a local directory.
///
/// Each blob is a flat file at `{dir}/{key}`; its URL is `{public_base}/{key}`.
/// The server is expected to serve `dir` under `public_base`.
pub struct LocalBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub async fn new(dir: PathBuf, public_base: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        let public_base = public_base.into().trim_end_matches('/').to_string();
        info!("Blob storage directory: {} (served at {})", dir.display(), public_base);
        Ok(Self { dir, public_base })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    fn key_for<'a>(&self, url: &'a str) -> Result<&'a str> {
        url.strip_prefix(self.public_base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| BlobError::ForeignUrl(url.to_string()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<String> {
        let path = self.file_path(key)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        info!("Stored blob {} ({} bytes)", key, data.len());
        Ok(self.url_for(key))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let key = self.key_for(url)?;
        let path = self.file_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Option<Vec<BlobEntry>>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut blobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                blobs.push(BlobEntry {
                    key: name.to_string(),
                    url: self.url_for(name),
                    modified: metadata.modified()?,
                });
            }
        }
        Ok(Some(blobs))
    }
}
