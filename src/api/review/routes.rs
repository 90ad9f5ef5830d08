use crate::api::models::AppState;
use crate::api::review::handlers::*;
use crate::api::review::images::upload_review_images_handler;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// Review routes; only the image upload gets the larger `upload_body_limit`
pub fn routes(upload_body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/reviews", post(create_review_handler))
        .route("/reviews/", post(create_review_handler))
        .route(
            "/reviews/images",
            post(upload_review_images_handler).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/reviews/my-reviews", get(my_reviews_handler))
        .route("/reviews/provider/{provider_id}", get(provider_reviews_handler))
        .route("/reviews/{review_id}", get(get_review_handler))
}
