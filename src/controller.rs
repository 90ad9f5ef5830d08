use crate::api::models::{AppError, CreateReviewRequest, CustomerInfo, ReviewWithCustomer};
use crate::auth::Directory;
use crate::storage::{InsertOutcome, Review, StoreSession};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Images a single review may carry
pub const MAX_REVIEW_IMAGES: usize = 5;

/// Review reads and writes on top of a store session
pub struct ReviewController;

impl ReviewController {
    pub async fn create_review(
        session: &StoreSession,
        directory: &Directory,
        request: CreateReviewRequest,
        customer_id: &str,
    ) -> Result<Review, AppError> {
        if !(1..=5).contains(&request.rating) {
            return Err(AppError::BadRequest("Rating must be between 1 and 5".to_string()));
        }

        let provider_id = request.provider_id.trim();
        if provider_id.is_empty() {
            return Err(AppError::BadRequest("Provider ID cannot be empty".to_string()));
        }
        let provider = directory
            .provider(provider_id)
            .ok_or_else(|| AppError::NotFound("Provider not found".to_string()))?;

        if request.images.len() > MAX_REVIEW_IMAGES {
            return Err(AppError::BadRequest(format!(
                "A review can have at most {} images",
                MAX_REVIEW_IMAGES
            )));
        }
        if request.images.iter().any(|url| url.trim().is_empty()) {
            return Err(AppError::BadRequest("Image URLs cannot be empty".to_string()));
        }

        let booking_id = request
            .booking_id
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());

        let review = Review {
            review_id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            provider_id: provider.id.clone(),
            booking_id,
            rating: request.rating,
            comment: request.comment.unwrap_or_default().trim().to_string(),
            images: request.images,
            created_at: Utc::now(),
        };

        let outcome = session
            .insert(review)
            .await
            .map_err(|e| AppError::Internal(format!("Store review failed: {}", e)))?;
        let review = match outcome {
            InsertOutcome::Stored(review) => review,
            InsertOutcome::DuplicateBooking => {
                return Err(AppError::Conflict(
                    "Review already submitted for this booking".to_string(),
                ));
            }
        };

        info!(
            review_id = %review.review_id,
            provider_id = %provider.id,
            provider = %provider.name,
            "Review stored"
        );
        Ok(review)
    }

    pub async fn get_provider_reviews(
        session: &StoreSession,
        directory: &Directory,
        provider_id: &str,
    ) -> Vec<ReviewWithCustomer> {
        session
            .by_provider(provider_id)
            .await
            .into_iter()
            .map(|review| Self::with_customer(directory, review))
            .collect()
    }

    pub async fn get_customer_reviews(
        session: &StoreSession,
        directory: &Directory,
        customer_id: &str,
    ) -> Vec<ReviewWithCustomer> {
        session
            .by_customer(customer_id)
            .await
            .into_iter()
            .map(|review| Self::with_customer(directory, review))
            .collect()
    }

    pub async fn get_review(session: &StoreSession, review_id: &str) -> Result<Review, AppError> {
        session
            .get(review_id)
            .await
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }

    fn with_customer(directory: &Directory, review: Review) -> ReviewWithCustomer {
        let customer = match directory.user(&review.customer_id) {
            Some(user) => CustomerInfo {
                id: user.id.clone(),
                name: user.name.clone(),
                avatar_url: user.avatar_url.clone(),
            },
            None => CustomerInfo {
                id: review.customer_id.clone(),
                name: "Unknown customer".to_string(),
                avatar_url: None,
            },
        };

        ReviewWithCustomer {
            review: review.into(),
            customer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::{ProviderEntry, UserEntry};
    use crate::storage::ReviewStore;
    use std::sync::Arc;

    fn directory() -> Directory {
        Directory::new(
            &[UserEntry {
                token: "t-c1".to_string(),
                id: "c1".to_string(),
                name: "Carol".to_string(),
                role: Role::Customer,
                avatar_url: Some("https://cdn.example.com/carol.png".to_string()),
            }],
            &[ProviderEntry {
                id: "p1".to_string(),
                name: "Paul's Painting".to_string(),
            }],
        )
    }

    fn request(rating: u8) -> CreateReviewRequest {
        CreateReviewRequest {
            provider_id: "p1".to_string(),
            rating,
            comment: Some("  tidy and on time  ".to_string()),
            booking_id: None,
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn creates_review_attributed_to_author() {
        let store = Arc::new(ReviewStore::in_memory());
        let session = store.session();
        let directory = directory();

        let review = ReviewController::create_review(&session, &directory, request(5), "c1")
            .await
            .unwrap();
        assert_eq!(review.customer_id, "c1");
        assert_eq!(review.provider_id, "p1");
        assert_eq!(review.comment, "tidy and on time");

        let fetched = ReviewController::get_review(&session, &review.review_id).await.unwrap();
        assert_eq!(fetched, review);

        let listed = ReviewController::get_provider_reviews(&session, &directory, "p1").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].customer.name, "Carol");
    }

    #[tokio::test]
    async fn rejects_out_of_range_ratings() {
        let store = Arc::new(ReviewStore::in_memory());
        let session = store.session();
        let directory = directory();

        for rating in [0, 6] {
            let err = ReviewController::create_review(&session, &directory, request(rating), "c1")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
        assert_eq!(session.count().await, 0);
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let store = Arc::new(ReviewStore::in_memory());
        let session = store.session();
        let mut req = request(4);
        req.provider_id = "ghost".to_string();

        let err = ReviewController::create_review(&session, &directory(), req, "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn too_many_images_rejected() {
        let store = Arc::new(ReviewStore::in_memory());
        let session = store.session();
        let mut req = request(4);
        req.images = (0..=MAX_REVIEW_IMAGES)
            .map(|i| format!("https://cdn.example.com/{}.png", i))
            .collect();

        let err = ReviewController::create_review(&session, &directory(), req, "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn one_review_per_booking() {
        let store = Arc::new(ReviewStore::in_memory());
        let session = store.session();
        let directory = directory();
        let mut req = request(5);
        req.booking_id = Some("b-42".to_string());

        ReviewController::create_review(&session, &directory, req, "c1")
            .await
            .unwrap();

        let mut again = request(3);
        again.booking_id = Some("b-42".to_string());
        let err = ReviewController::create_review(&session, &directory, again, "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reviews_of_one_booking_store_once() {
        let store = Arc::new(ReviewStore::in_memory());
        let directory = Arc::new(directory());

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let directory = Arc::clone(&directory);
                tokio::spawn(async move {
                    let mut req = request(5);
                    req.booking_id = Some("b-7".to_string());
                    ReviewController::create_review(&store.session(), &directory, req, "c1").await
                })
            })
            .collect();

        let mut stored = 0;
        let mut conflicts = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => stored += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn missing_review_is_not_found() {
        let store = Arc::new(ReviewStore::in_memory());
        let err = ReviewController::get_review(&store.session(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_author_gets_placeholder_info() {
        let store = Arc::new(ReviewStore::in_memory());
        let session = store.session();
        let directory = directory();
        ReviewController::create_review(&session, &directory, request(2), "departed")
            .await
            .unwrap();

        let mine = ReviewController::get_customer_reviews(&session, &directory, "departed").await;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].customer.id, "departed");
        assert_eq!(mine[0].customer.name, "Unknown customer");
    }
}
