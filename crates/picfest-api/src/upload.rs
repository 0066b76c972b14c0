use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use picfest_core::wizard::StagedFile;

use crate::error::{ApiError, ApiResult};

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Pull the `file` part out of a multipart body.
pub async fn read_file(mut multipart: Multipart) -> ApiResult<StagedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Empty file".into()));
        }
        return Ok(StagedFile {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(ApiError::BadRequest("Missing 'file' part".into()))
}

pub fn is_image(file: &StagedFile) -> bool {
    file.content_type.trim().starts_with("image/")
}
