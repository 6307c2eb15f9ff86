//! Multipart image upload extraction.

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{Error, Result};

const FILE_FIELD: &str = "file";
const DEFAULT_FILENAME: &str = "upload";

/// An uploaded image, read fully into memory.
#[derive(Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Pull the `file` field out of a multipart body.
///
/// Rejects uploads whose declared content type is not `image/*`.
pub async fn read_image_upload(mut multipart: Multipart) -> Result<ImageUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(Error::InvalidRequest("File must be an image".to_string()));
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read upload: {}", e)))?;

        return Ok(ImageUpload { filename, data });
    }

    Err(Error::InvalidRequest("No file uploaded".to_string()))
}
