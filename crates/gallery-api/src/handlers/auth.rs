use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use gallery_types::api::{ApiResponse, AuthResponse, LoginRequest, RegisterRequest};

use crate::error::ApiError;
use crate::state::AppState;
use crate::validate::{Credentials, NewAccount};

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let account = NewAccount::try_from(req)?;

    let (token, user) = state.register(account).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AuthResponse { token, user })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let credentials = Credentials::try_from(req)?;

    let (token, user) = state.login(credentials).await?;

    Ok(Json(ApiResponse::ok(AuthResponse { token, user })))
}
