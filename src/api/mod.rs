pub mod models;
pub mod review;

// Re-exports
pub use models::*;

use axum::{extract::State, routing::get, Json, Router};

pub async fn health_handler(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    Json(models::HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_reviews: state.review_store.count().await,
    })
}

/// API routes with state applied. `upload_body_limit` caps image uploads;
/// every other route keeps axum's default body limit.
pub fn router(state: AppState, upload_body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(review::routes(upload_body_limit))
        .with_state(state)
}
