use axum::{Extension, Json, extract::State, response::IntoResponse};

use gallery_types::api::{ApiResponse, UserResponse};

use crate::error::ApiError;
use crate::state::AppState;
use crate::token::Identity;

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.current_user(&identity).await?;
    Ok(Json(ApiResponse::ok(UserResponse { user })))
}
