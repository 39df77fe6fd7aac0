/// Gallery blob storage.
///
/// Photo bytes never touch the database: they are written to an object store
/// and only the durable URL it returns is persisted. Two backends exist:
/// - `LocalBlobStore`: files in a directory, served by the gallery server itself
/// - `HttpBlobStore`: a remote object store speaking a small PUT/list/delete API

pub mod local;
pub mod remote;

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use local::LocalBlobStore;
pub use remote::HttpBlobStore;

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object store rejected request: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("URL is not managed by this store: {0}")]
    ForeignUrl(String),
}

/// A stored blob as reported by `BlobStore::list`.
#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub key: String,
    pub url: String,
    pub modified: SystemTime,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;

    /// Remove the blob behind a URL previously returned by `put`.
    /// Deleting a blob that is already gone is not an error.
    async fn delete(&self, url: &str) -> Result<()>;

    /// Enumerate stored blobs. Backends that cannot enumerate return `None`.
    async fn list(&self) -> Result<Option<Vec<BlobEntry>>> {
        Ok(None)
    }

    /// The storage key behind a URL returned by `put`, whatever public base
    /// it was minted with. `None` if no key can be recovered.
    fn key_for_url(&self, url: &str) -> Option<String> {
        url_key(url).map(str::to_string)
    }
}

/// Last path segment of a blob URL, ignoring query and fragment.
pub fn url_key(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, key) = path.rsplit_once('/')?;
    validate_key(key).ok()?;
    Some(key)
}

/// Keys are single path segments: no separators, no dot-segments.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control)
    {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}
