use crate::auth::Directory;
use crate::media::{ImageHost, UploadError};
use crate::storage::{Review, ReviewStore, StoreSession};
use axum::{
    extract::{
        rejection::JsonRejection, multipart::MultipartRejection,
        FromRequest, FromRequestParts,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub review_store: Arc<ReviewStore>,
    pub directory: Arc<Directory>,
    pub image_host: Arc<dyn ImageHost>,
    pub max_upload_files: usize,
}

/// JSON body whose rejections are reported as [`AppError`]
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Request to submit a review
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub provider_id: String,
    pub rating: u8,

    #[serde(default, alias = "content")]
    pub comment: Option<String>,

    #[serde(default)]
    pub booking_id: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public view of a reviewing customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A single review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub review_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub booking_id: Option<String>,
    pub rating: u8,
    pub comment: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A review together with its author's public info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewWithCustomer {
    #[serde(flatten)]
    pub review: ReviewResponse,
    pub customer: CustomerInfo,
}

/// Hosted URLs of uploaded review images
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub urls: Vec<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub total_reviews: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl FromRequestParts<AppState> for StoreSession {
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Infallible> {
        Ok(state.review_store.session())
    }
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            review_id: review.review_id,
            customer_id: review.customer_id,
            provider_id: review.provider_id,
            booking_id: review.booking_id,
            rating: review.rating,
            comment: review.comment,
            images: review.images,
            created_at: review.created_at,
        }
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    /// Refusal from the image host, relayed with its own status
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Client { status, message } => AppError::Upstream { status, message },
            UploadError::Unexpected(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(rejection.body_text());
        }
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(msg) = &self {
            error!("Internal error: {}", msg);
        }

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.to_string(),
        });

        if matches!(self, AppError::Unauthorized(_)) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }

        (status, body).into_response()
    }
}
