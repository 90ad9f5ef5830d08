use crate::api::models::*;
use crate::auth::CurrentCustomer;
use crate::media::ImageFile;
use axum::{
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::info;

/// Folder on the image host that review images go into
pub const REVIEW_IMAGE_FOLDER: &str = "reviews";

/// Multipart field carrying the files
const FILES_FIELD: &str = "files";

fn multipart_error(context: &str, err: MultipartError) -> AppError {
    let message = format!("{}: {}", context, err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(message)
    }
}

/// Host uploaded images and return their URLs. Nothing is attached to a
/// review here; callers pass the URLs along when they create one.
pub async fn upload_review_images_handler(
    State(state): State<AppState>,
    CurrentCustomer(customer): CurrentCustomer,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageUploadResponse>, AppError> {
    let mut multipart = multipart?;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read upload", e))?;

        files.push(ImageFile {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No files provided".to_string()));
    }
    if files.len() > state.max_upload_files {
        return Err(AppError::BadRequest(format!(
            "At most {} files can be uploaded at once",
            state.max_upload_files
        )));
    }

    info!(customer_id = %customer.id, count = files.len(), "Uploading review images");

    let uploaded = state
        .image_host
        .upload_multiple_images(files, REVIEW_IMAGE_FOLDER)
        .await?;

    Ok(Json(ImageUploadResponse {
        urls: uploaded.into_iter().map(|image| image.url).collect(),
    }))
}
