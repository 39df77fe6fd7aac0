use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use bytes::BytesMut;
use tracing::debug;

use crate::error::ApiError;
use crate::validate::{ImageType, PhotoFile};

/// Room for multipart boundaries and the text fields on top of the file cap.
pub const FORM_OVERHEAD: usize = 64 * 1024;

/// Raw fields of the photo upload form. Title and description are validated
/// by the service; the file part is checked for type and size here.
#[derive(Debug, Default)]
pub struct PhotoForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: Option<PhotoFile>,
}

/// Read a `multipart/form-data` body with `title`, `description` and one
/// image part named `photo` (or `file`).
pub async fn read_photo_form(
    mut multipart: Multipart,
    max_file_size: usize,
) -> Result<PhotoForm, ApiError> {
    let mut form = PhotoForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => form.description = Some(field.text().await.map_err(multipart_error)?),
            "photo" | "file" => {
                if form.file.is_some() {
                    return Err(ApiError::validation("Only one photo may be uploaded"));
                }

                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().unwrap_or("").to_string();

                let mut data = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if data.len() + chunk.len() > max_file_size {
                        return Err(too_large(max_file_size));
                    }
                    data.extend_from_slice(&chunk);
                }

                // An untouched file input arrives as an empty
                // application/octet-stream part: no file, whatever its type.
                if data.is_empty() {
                    continue;
                }

                let image_type = content_type
                    .as_deref()
                    .and_then(ImageType::from_mime)
                    .ok_or_else(|| ApiError::validation("Only PNG and JPEG images are allowed"))?;
                form.file = Some(PhotoFile {
                    file_name,
                    image_type,
                    data: data.freeze(),
                });
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}

fn too_large(max_file_size: usize) -> ApiError {
    ApiError::Validation(format!(
        "File too large. Maximum size is {}MB",
        max_file_size.div_ceil(1024 * 1024)
    ))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::Validation(format!("File upload error: {}", err.body_text()))
}
