use axum::{
    Extension, Json,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use gallery_types::api::{
    ApiResponse, MessageResponse, PhotoListResponse, PhotoResponse, UpdatePhotoRequest,
};

use crate::error::ApiError;
use crate::state::AppState;
use crate::token::Identity;
use crate::upload::read_photo_form;

/// GET /api/photos (no auth)
pub async fn list_photos(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let photos = state.list_all().await?;
    Ok(Json(ApiResponse::ok(PhotoListResponse { photos })))
}

/// GET /api/photos/users/{id}/photos
pub async fn list_user_photos(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Extension(_identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    // An id that is not a UUID owns nothing.
    let photos = match owner_id.parse::<Uuid>() {
        Ok(owner_id) => state.list_by_owner(owner_id).await?,
        Err(_) => Vec::new(),
    };
    Ok(Json(ApiResponse::ok(PhotoListResponse { photos })))
}

/// POST /api/photos, multipart: title, description, photo
pub async fn create_photo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_photo_form(multipart?, state.max_file_size).await?;

    let photo = state
        .create_photo(
            identity.user_id,
            form.title.as_deref(),
            form.description.as_deref(),
            form.file,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(PhotoResponse { photo })),
    ))
}

/// PUT /api/photos/{id}
pub async fn update_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<UpdatePhotoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let photo = state
        .update_photo(
            &photo_id,
            identity.user_id,
            req.title.as_deref(),
            req.description.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(PhotoResponse { photo })))
}

/// DELETE /api/photos/{id}
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    state.remove_photo(&photo_id, identity.user_id).await?;

    Ok(Json(ApiResponse::ok(MessageResponse {
        message: "Photo deleted successfully".to_string(),
    })))
}

/// POST /api/photos/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let photo = state.toggle_like(&photo_id, identity.user_id).await?;
    Ok(Json(ApiResponse::ok(PhotoResponse { photo })))
}
