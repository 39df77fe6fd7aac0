use axum::{
    Json,
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gallery_blob::BlobError;
use gallery_types::api::ErrorResponse;
use thiserror::Error;
use tracing::error;

/// Every way a gallery operation can fail. The `Display` text is the message
/// sent to the client, so it never includes internal detail.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Photo not found")]
    NotFound,

    #[error("Not authorized to modify this photo")]
    Forbidden,

    #[error("No photo uploaded")]
    MissingFile,

    #[error("Photo upload failed")]
    UploadFailure(#[source] BlobError),

    #[error("Server error occurred")]
    StoreFailure,

    #[error("Server error occurred")]
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// Log a persistence-layer error and collapse it to `StoreFailure`.
    pub fn store(err: anyhow::Error) -> Self {
        error!("Store error: {:#}", err);
        ApiError::StoreFailure
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MissingFile => StatusCode::BAD_REQUEST,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::UploadFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::StoreFailure | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        error!("Blob store error: {}", err);
        ApiError::UploadFailure(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_stays_out_of_messages() {
        let err = ApiError::from(BlobError::Rejected {
            status: 500,
            body: "bucket quota exceeded".into(),
        });
        assert_eq!(err.to_string(), "Photo upload failed");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::StoreFailure.to_string(), "Server error occurred");
    }

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
    }
}
