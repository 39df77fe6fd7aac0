pub mod auth;
pub mod photos;
pub mod users;

use axum::{Json, http::StatusCode, response::IntoResponse};

use gallery_types::api::ErrorResponse;

/// GET /health (no auth)
pub async fn health() -> &'static str {
    "ok"
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Route not found")))
}
