use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};

/// Background task that deletes blobs no photo references.
///
/// Covers the gaps the request path cannot: a compensating delete that itself
/// failed, a blob delete that failed after a photo was removed, or a crash
/// between upload and record write.
pub async fn run_reconcile_loop(state: AppState, interval_secs: u64, grace: Duration) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    // The first tick completes immediately; skip it so startup stays quiet.
    interval.tick().await;

    loop {
        interval.tick().await;

        match state.sweep_orphans(grace).await {
            Ok(count) => {
                if count > 0 {
                    info!("Reconcile: removed {} orphaned blobs", count);
                }
            }
            Err(e) => {
                warn!("Reconcile error: {}", e);
            }
        }
    }
}

impl AppStateInner {
    /// Delete every stored blob that is unreferenced and older than `grace`.
    ///
    /// Blobs are matched to photos by storage key, so records written under
    /// an older public base still protect their blobs. If any referenced URL
    /// has no recoverable key the sweep deletes nothing.
    ///
    /// The grace period protects uploads whose record write is still in
    /// flight. Backends that cannot enumerate their blobs are skipped.
    pub async fn sweep_orphans(&self, grace: Duration) -> Result<usize, ApiError> {
        let Some(blobs) = self.blobs.list().await? else {
            return Ok(0);
        };

        let urls = self
            .blocking(|db| db.photo_file_urls().map_err(ApiError::store))
            .await?;
        let mut referenced = HashSet::with_capacity(urls.len());
        for url in &urls {
            match self.blobs.key_for_url(url) {
                Some(key) => {
                    referenced.insert(key);
                }
                None => {
                    warn!("Reconcile skipped: no blob key in photo URL {}", url);
                    return Ok(0);
                }
            }
        }

        let now = SystemTime::now();
        let mut removed = 0;
        for blob in blobs {
            if referenced.contains(&blob.key) {
                continue;
            }
            let age = now.duration_since(blob.modified).unwrap_or_default();
            if age < grace {
                continue;
            }

            match self.blobs.delete(&blob.url).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove orphaned blob {}: {}", blob.url, e),
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use gallery_blob::LocalBlobStore;
    use gallery_db::models::NewPhoto;

    use super::*;
    use crate::testing::{TEST_MAX_FILE_SIZE, TEST_SECRET, TestGallery, jpeg};
    use crate::token::TokenIssuer;

    #[tokio::test]
    async fn sweep_removes_only_unreferenced_blobs() {
        let gallery = TestGallery::new().await;
        let owner = gallery.user("Alice");
        let photo = gallery
            .state
            .create_photo(owner, Some("Keep"), None, Some(jpeg()))
            .await
            .unwrap();
        gallery
            .state
            .blobs
            .put("photo-orphan.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(gallery.blob_count(), 2);

        let removed = gallery.state.sweep_orphans(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(gallery.blob_count(), 1);

        let remaining = gallery.state.blobs.list().await.unwrap().unwrap();
        assert_eq!(remaining[0].url, photo.file_url);
    }

    #[tokio::test]
    async fn sweep_spares_fresh_blobs() {
        let gallery = TestGallery::new().await;
        gallery
            .state
            .blobs
            .put("photo-inflight.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let removed = gallery
            .state
            .sweep_orphans(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(gallery.blob_count(), 1);
    }

    #[tokio::test]
    async fn sweep_matches_photos_saved_under_another_public_base() {
        let gallery = TestGallery::new().await;
        let owner = gallery.user("Alice");
        gallery
            .state
            .create_photo(owner, Some("Keep"), None, Some(jpeg()))
            .await
            .unwrap();
        gallery
            .state
            .blobs
            .put("photo-orphan.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        // Same directory and database, served from a new address.
        let moved = LocalBlobStore::new(gallery.blob_dir.clone(), "https://photos.example.com/uploads")
            .await
            .unwrap();
        let state = AppStateInner::new(
            gallery.state.db.clone(),
            Arc::new(moved),
            TokenIssuer::new(TEST_SECRET, chrono::Duration::days(7)),
            TEST_MAX_FILE_SIZE,
        );

        let removed = state.sweep_orphans(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(gallery.blob_count(), 1);
        assert_eq!(state.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unresolvable_photo_url_stops_the_sweep() {
        let gallery = TestGallery::new().await;
        let owner = gallery.user("Alice").to_string();
        gallery
            .state
            .db
            .insert_photo(&NewPhoto {
                id: &uuid::Uuid::new_v4().to_string(),
                title: "Odd",
                description: "",
                file_url: "https://cdn.example.com/",
                user_id: &owner,
            })
            .unwrap();
        gallery
            .state
            .blobs
            .put("photo-orphan.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let removed = gallery.state.sweep_orphans(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 0);
        assert_eq!(gallery.blob_count(), 1);
    }
}
