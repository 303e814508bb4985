use std::sync::Arc;

use pocketlegal_auth::Claims;
use pocketlegal_common::{AppError, BookingStatus, Page, PageRequest};
use pocketlegal_database::{
    BookingStore, CatalogStore, LawyerStore, NewReview, Review, ReviewFilter, ReviewStore,
    ReviewUpdate, Store,
};
use uuid::Uuid;

use super::{NotificationDispatcher, NotificationEvent};
use crate::models::*;

pub struct ReviewService {
    store: Arc<dyn Store>,
    notifier: NotificationDispatcher,
}

impl ReviewService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
            notifier: state.notifier.clone(),
        }
    }

    /// Reviews a completed booking of the caller. A missing lawyer or service
    /// id falls back to the booking's; a supplied one must match it.
    pub async fn create(
        &self,
        claims: &Claims,
        request: CreateReviewRequest,
    ) -> Result<Review, AppError> {
        if request.lawyer_id.is_none() && request.service_id.is_none() {
            return Err(AppError::Validation(
                "Either lawyer ID or service ID must be provided".to_string(),
            ));
        }

        let user_id = claims.user_id()?;
        let booking = self
            .store
            .find_booking(request.booking_id)
            .await?
            .filter(|b| b.customer_id == user_id && b.status == BookingStatus::Completed)
            .ok_or_else(|| AppError::NotFound("Booking not found or not completed".to_string()))?;

        if request.lawyer_id.is_some_and(|id| id != booking.lawyer_id) {
            return Err(AppError::Validation(
                "Lawyer does not match the booking".to_string(),
            ));
        }
        if request.service_id.is_some_and(|id| id != booking.service_id) {
            return Err(AppError::Validation(
                "Service does not match the booking".to_string(),
            ));
        }

        let review = self
            .store
            .create_review(NewReview {
                user_id,
                booking_id: booking.id,
                lawyer_id: Some(booking.lawyer_id),
                service_id: Some(booking.service_id),
                rating: request.rating,
                comment: request.comment,
            })
            .await?;

        tracing::info!(review_id = %review.id, booking_id = %booking.id, rating = review.rating, "Review created");
        self.notifier.dispatch(NotificationEvent::Review {
            review: review.clone(),
        });
        Ok(review)
    }

    pub async fn update(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateReviewRequest,
    ) -> Result<Review, AppError> {
        let review = self.find(id).await?;
        if review.user_id != claims.user_id()? {
            return Err(AppError::Authorization(
                "Not authorized to update this review".to_string(),
            ));
        }

        let update = ReviewUpdate {
            rating: request.rating,
            comment: request.comment,
        };
        self.store.update_review(id, update).await
    }

    pub async fn delete(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        let review = self.find(id).await?;
        if review.user_id != claims.user_id()? && !claims.is_admin() {
            return Err(AppError::Authorization(
                "Not authorized to delete this review".to_string(),
            ));
        }

        self.store
            .delete_review(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;
        tracing::info!(review_id = %id, "Review deleted");
        Ok(())
    }

    pub async fn list_for_service(
        &self,
        service_id: Uuid,
        query: PageQuery,
    ) -> Result<(Page<Review>, PageRequest), AppError> {
        if self.store.find_service(service_id).await?.is_none() {
            return Err(AppError::NotFound("Service not found".to_string()));
        }
        let filter = ReviewFilter {
            service_id: Some(service_id),
            published_only: true,
            ..Default::default()
        };
        self.list(filter, query).await
    }

    pub async fn list_for_lawyer(
        &self,
        lawyer_id: Uuid,
        query: PageQuery,
    ) -> Result<(Page<Review>, PageRequest), AppError> {
        if self.store.find_lawyer(lawyer_id).await?.is_none() {
            return Err(AppError::NotFound("Lawyer not found".to_string()));
        }
        let filter = ReviewFilter {
            lawyer_id: Some(lawyer_id),
            published_only: true,
            ..Default::default()
        };
        self.list(filter, query).await
    }

    pub async fn list_for_user(
        &self,
        claims: &Claims,
        query: PageQuery,
    ) -> Result<(Page<Review>, PageRequest), AppError> {
        let filter = ReviewFilter {
            user_id: Some(claims.user_id()?),
            ..Default::default()
        };
        self.list(filter, query).await
    }

    async fn list(
        &self,
        filter: ReviewFilter,
        query: PageQuery,
    ) -> Result<(Page<Review>, PageRequest), AppError> {
        let page = query.page_request();
        Ok((self.store.list_reviews(filter, page).await?, page))
    }

    async fn find(&self, id: Uuid) -> Result<Review, AppError> {
        self.store
            .find_review(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }
}
