//! Validated request shapes.
//!
//! Raw request bodies (all-optional fields) are converted into these types at
//! the edge; business logic only ever sees values that passed the checks.

use bytes::Bytes;

use gallery_types::api::{LoginRequest, RegisterRequest};

use crate::error::ApiError;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug)]
pub struct NewAccount {
    pub name: String,
    /// Trimmed and lower-cased.
    pub email: String,
    pub password: String,
}

impl TryFrom<RegisterRequest> for NewAccount {
    type Error = ApiError;

    fn try_from(req: RegisterRequest) -> Result<Self, Self::Error> {
        let (Some(name), Some(email), Some(password)) = (req.name, req.email, req.password) else {
            return Err(ApiError::validation("All fields are required"));
        };

        let name = name.trim().to_string();
        let email = normalize_email(&email);
        if name.is_empty() || email.is_empty() || password.trim().is_empty() {
            return Err(ApiError::validation("All fields are required"));
        }
        if !email.contains('@') {
            return Err(ApiError::validation("Please enter a valid email"));
        }

        Ok(Self {
            name,
            email,
            password,
        })
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl TryFrom<LoginRequest> for Credentials {
    type Error = ApiError;

    fn try_from(req: LoginRequest) -> Result<Self, Self::Error> {
        let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
        let password = req.password.unwrap_or_default();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }
        Ok(Self { email, password })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Title and description of a photo, trimmed and bounds-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoText {
    pub title: String,
    pub description: String,
}

impl PhotoText {
    pub fn new(title: Option<&str>, description: Option<&str>) -> Result<Self, ApiError> {
        let title = title.map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(ApiError::validation("Photo title is required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ApiError::validation(format!(
                "Title must not exceed {} characters",
                MAX_TITLE_CHARS
            )));
        }

        let description = description.map(str::trim).unwrap_or_default();
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ApiError::validation(format!(
                "Description must not exceed {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }

        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Png,
    Jpeg,
}

impl ImageType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageType::Png),
            "image/jpeg" | "image/jpg" => Some(ImageType::Jpeg),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Png => "png",
            ImageType::Jpeg => "jpg",
        }
    }
}

/// An uploaded image that already passed the type and size checks.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub file_name: String,
    pub image_type: ImageType,
    pub data: Bytes,
}
