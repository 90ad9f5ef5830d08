//! Image hosting for review attachments.

pub mod local;

pub use local::LocalImageHost;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// A file received from a client, ready to be hosted
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Where a hosted image ended up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub bytes: usize,
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// The host refused the file; status and message are meant for the caller
    #[error("{message}")]
    Client { status: StatusCode, message: String },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl UploadError {
    pub fn client(status: StatusCode, message: impl Into<String>) -> Self {
        UploadError::Client {
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload_image(&self, file: ImageFile, folder: &str) -> Result<UploadedImage, UploadError>;

    /// Uploads one after another, so results come back in request order.
    /// Stops at the first failure.
    async fn upload_multiple_images(
        &self,
        files: Vec<ImageFile>,
        folder: &str,
    ) -> Result<Vec<UploadedImage>, UploadError> {
        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            uploaded.push(self.upload_image(file, folder).await?);
        }
        Ok(uploaded)
    }
}
