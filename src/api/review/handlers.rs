use crate::api::models::*;
use crate::auth::{CurrentCustomer, CurrentUser};
use crate::controller::ReviewController;
use crate::storage::StoreSession;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

pub async fn create_review_handler(
    State(state): State<AppState>,
    CurrentCustomer(customer): CurrentCustomer,
    session: StoreSession,
    ApiJson(request): ApiJson<CreateReviewRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    info!(
        customer_id = %customer.id,
        provider_id = %request.provider_id,
        rating = request.rating,
        "Submitting review"
    );

    ReviewController::create_review(&session, &state.directory, request, &customer.id).await?;

    Ok(Json(MessageResponse {
        message: "Review submitted".to_string(),
    }))
}

pub async fn provider_reviews_handler(
    State(state): State<AppState>,
    session: StoreSession,
    Path(provider_id): Path<String>,
) -> Json<Vec<ReviewWithCustomer>> {
    let reviews =
        ReviewController::get_provider_reviews(&session, &state.directory, &provider_id).await;

    info!(provider_id = %provider_id, found = reviews.len(), "Provider reviews listed");
    Json(reviews)
}

pub async fn my_reviews_handler(
    State(state): State<AppState>,
    CurrentCustomer(customer): CurrentCustomer,
    session: StoreSession,
) -> Json<Vec<ReviewWithCustomer>> {
    let reviews =
        ReviewController::get_customer_reviews(&session, &state.directory, &customer.id).await;

    info!(customer_id = %customer.id, found = reviews.len(), "Customer reviews listed");
    Json(reviews)
}

pub async fn get_review_handler(
    CurrentUser(_user): CurrentUser,
    session: StoreSession,
    Path(review_id): Path<String>,
) -> Result<Json<ReviewResponse>, AppError> {
    let review = ReviewController::get_review(&session, &review_id).await?;
    Ok(Json(review.into()))
}
