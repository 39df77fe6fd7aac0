use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use gallery_db::is_foreign_key_violation;
use gallery_db::models::{NewPhoto, PhotoRow};
use gallery_types::models::{Photo, PhotoOwner};

use crate::error::ApiError;
use crate::state::AppStateInner;
use crate::validate::{PhotoFile, PhotoText};

const MAX_KEY_NAME_CHARS: usize = 64;

impl AppStateInner {
    /// Every photo, newest first. No authentication required.
    pub async fn list_all(&self) -> Result<Vec<Photo>, ApiError> {
        let rows = self
            .blocking(|db| db.list_photos().map_err(ApiError::store))
            .await?;
        Ok(rows.into_iter().map(photo_from_row).collect())
    }

    /// One owner's photos, newest first.
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Photo>, ApiError> {
        let owner = owner_id.to_string();
        let rows = self
            .blocking(move |db| db.list_photos_by_owner(&owner).map_err(ApiError::store))
            .await?;
        Ok(rows.into_iter().map(photo_from_row).collect())
    }

    /// Validate, upload the bytes, then persist a record pointing at the blob.
    ///
    /// Nothing is uploaded unless the input is valid. If the record write fails
    /// after the upload succeeded, the blob is deleted again (best effort);
    /// anything that survives that is left for the orphan sweep.
    pub async fn create_photo(
        &self,
        owner_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
        file: Option<PhotoFile>,
    ) -> Result<Photo, ApiError> {
        let file = file.ok_or(ApiError::MissingFile)?;
        if file.data.is_empty() {
            return Err(ApiError::MissingFile);
        }
        let text = PhotoText::new(title, description)?;
        self.require_account(owner_id).await?;

        let photo_id = Uuid::new_v4();
        let key = blob_key(photo_id, &file);
        let size = file.data.len();

        let file_url = self
            .blobs
            .put(&key, file.data, file.image_type.mime())
            .await?;

        let (id, owner, url) = (photo_id.to_string(), owner_id.to_string(), file_url.clone());
        let inserted = self
            .blocking(move |db| {
                db.insert_photo(&NewPhoto {
                    id: &id,
                    title: &text.title,
                    description: &text.description,
                    file_url: &url,
                    user_id: &owner,
                })
                .map_err(requester_write_error)
            })
            .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                warn!("Record write failed after upload, removing blob {}", file_url);
                if let Err(cleanup) = self.blobs.delete(&file_url).await {
                    error!("Orphaned blob {} left behind: {}", file_url, cleanup);
                }
                return Err(e);
            }
        };

        info!("Photo {} created by {} ({} bytes)", photo_id, owner_id, size);
        Ok(photo_from_row(row))
    }

    /// Owner-only edit of title and description.
    pub async fn update_photo(
        &self,
        photo_id: &str,
        requester: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Photo, ApiError> {
        let photo_id = parse_photo_id(photo_id)?;
        self.owned_photo(photo_id, requester).await?;

        let text = PhotoText::new(title, description)?;
        let id = photo_id.to_string();
        let row = self
            .blocking(move |db| {
                db.update_photo(&id, &text.title, &text.description)
                    .map_err(ApiError::store)
            })
            .await?
            .ok_or(ApiError::NotFound)?;

        info!("Photo {} updated by {}", photo_id, requester);
        Ok(photo_from_row(row))
    }

    /// Owner-only delete. The record goes first; the blob is removed best effort.
    pub async fn remove_photo(&self, photo_id: &str, requester: Uuid) -> Result<(), ApiError> {
        let photo_id = parse_photo_id(photo_id)?;
        let row = self.owned_photo(photo_id, requester).await?;

        let id = photo_id.to_string();
        let deleted = self
            .blocking(move |db| db.delete_photo(&id).map_err(ApiError::store))
            .await?;
        if !deleted {
            return Err(ApiError::NotFound);
        }
        info!("Photo {} deleted by {}", photo_id, requester);

        if let Err(e) = self.blobs.delete(&row.file_url).await {
            warn!("Blob {} for deleted photo {} not removed: {}", row.file_url, photo_id, e);
        }
        Ok(())
    }

    /// Flip the requester's membership in the photo's like set.
    pub async fn toggle_like(&self, photo_id: &str, requester: Uuid) -> Result<Photo, ApiError> {
        let photo_id = parse_photo_id(photo_id)?;
        let (pid, uid) = (photo_id.to_string(), requester.to_string());
        let (added, row) = self
            .blocking(move |db| db.toggle_like(&pid, &uid).map_err(requester_write_error))
            .await?
            .ok_or(ApiError::NotFound)?;

        info!(
            "Photo {} {} by {}",
            photo_id,
            if added { "liked" } else { "unliked" },
            requester
        );
        Ok(photo_from_row(row))
    }

    /// A valid token whose account is gone (e.g. a reset database) is
    /// treated as an invalid token, before anything is uploaded.
    async fn require_account(&self, user_id: Uuid) -> Result<(), ApiError> {
        let id = user_id.to_string();
        self.blocking(move |db| db.get_user_by_id(&id).map_err(ApiError::store))
            .await?
            .map(|_| ())
            .ok_or_else(|| {
                warn!("Token for missing account {}", user_id);
                ApiError::InvalidToken
            })
    }

    /// Load a photo and check that `requester` owns it.
    async fn owned_photo(&self, photo_id: Uuid, requester: Uuid) -> Result<PhotoRow, ApiError> {
        let id = photo_id.to_string();
        let row = self
            .blocking(move |db| db.get_photo(&id).map_err(ApiError::store))
            .await?
            .ok_or(ApiError::NotFound)?;

        if row.user_id != requester.to_string() {
            warn!("User {} may not modify photo {}", requester, photo_id);
            return Err(ApiError::Forbidden);
        }
        Ok(row)
    }
}

/// Writes keyed to the requester fail their foreign key when the account no
/// longer exists.
fn requester_write_error(err: anyhow::Error) -> ApiError {
    if is_foreign_key_violation(&err) {
        warn!("Write refused: requesting account no longer exists");
        ApiError::InvalidToken
    } else {
        ApiError::store(err)
    }
}

/// Ids that are not UUIDs cannot name a stored photo.
fn parse_photo_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>().map_err(|_| ApiError::NotFound)
}

/// `photo-{id}-{sanitized name}`, always ending in the image's extension.
fn blob_key(photo_id: Uuid, file: &PhotoFile) -> String {
    let ext = file.image_type.extension();
    let base = file.file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);

    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .take(MAX_KEY_NAME_CHARS)
        .collect();
    if name.trim_matches('-').is_empty() {
        name = "upload".to_string();
    }

    format!("photo-{}-{}.{}", photo_id, name, ext)
}

fn photo_from_row(row: PhotoRow) -> Photo {
    let likes = row
        .likes
        .iter()
        .filter_map(|uid| match uid.parse::<Uuid>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Corrupt like user_id '{}' on photo '{}': {}", uid, row.id, e);
                None
            }
        })
        .collect();

    Photo {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt photo id '{}': {}", row.id, e);
            Uuid::default()
        }),
        owner: PhotoOwner {
            id: row.user_id.parse().unwrap_or_else(|e| {
                warn!("Corrupt owner id '{}' on photo '{}': {}", row.user_id, row.id, e);
                Uuid::default()
            }),
            name: row.owner_name,
        },
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on photo '{}'", row.created_at, row.id);
            DateTime::default()
        }),
        title: row.title,
        description: row.description,
        file_url: row.file_url,
        likes,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // SQLite's datetime() format, naive UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .ok()
        })
}
