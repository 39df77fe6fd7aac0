use std::sync::Arc;

use gallery_blob::BlobStore;
use gallery_db::Database;
use tracing::error;

use crate::error::ApiError;
use crate::token::TokenIssuer;

pub type AppState = Arc<AppStateInner>;

/// Everything a request handler needs, constructed once at startup.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub blobs: Arc<dyn BlobStore>,
    pub tokens: TokenIssuer,
    /// Upload cap in bytes.
    pub max_file_size: usize,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        tokens: TokenIssuer,
        max_file_size: usize,
    ) -> AppState {
        Arc::new(Self {
            db,
            blobs,
            tokens,
            max_file_size,
        })
    }

    /// Run blocking store work off the async runtime.
    pub(crate) async fn blocking<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::StoreFailure
            })?
    }
}
