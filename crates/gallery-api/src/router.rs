use std::any::Any;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use gallery_types::api::ErrorResponse;

use crate::handlers::{self, auth, photos, users};
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::upload::FORM_OVERHEAD;

/// All API routes. Transport layers (CORS, tracing, static files) are added
/// by the server binary.
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_file_size + FORM_OVERHEAD);

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/photos", get(photos::list_photos))
        .route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/api/users/me", get(users::me))
        .route("/api/photos", post(photos::create_photo).layer(upload_limit))
        .route(
            "/api/photos/{id}",
            put(photos::update_photo).delete(photos::delete_photo),
        )
        .route("/api/photos/{id}/like", post(photos::toggle_like))
        .route("/api/photos/users/{id}/photos", get(photos::list_user_photos))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// A panicking handler becomes a generic 500 instead of a dropped connection.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Server error occurred")),
    )
        .into_response()
}
