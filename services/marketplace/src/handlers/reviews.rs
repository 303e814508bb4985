use axum::{
    extract::{Path, Query, State},
    Json,
};
use pocketlegal_auth::Claims;
use pocketlegal_common::{Empty, Page, PageRequest};
use pocketlegal_database::Review;
use uuid::Uuid;
use validator::Validate;

use super::{created, ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, ReviewService};

fn review_list((page, request): (Page<Review>, PageRequest)) -> ApiResult<ReviewList> {
    ok(ReviewList {
        meta: PageMeta::new(&page, request),
        reviews: page.items,
    })
}

pub async fn create_review(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<ReviewPayload> {
    request.validate().map_err(validation_error)?;
    let review = ReviewService::new(&state).create(&claims, request).await?;
    created("Review submitted successfully", ReviewPayload { review })
}

pub async fn update_review(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateReviewRequest>,
) -> ApiResult<ReviewPayload> {
    request.validate().map_err(validation_error)?;
    let review = ReviewService::new(&state).update(&claims, id, request).await?;
    ok_with("Review updated successfully", ReviewPayload { review })
}

pub async fn delete_review(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<Empty> {
    ReviewService::new(&state).delete(&claims, id).await?;
    ok_with("Review deleted successfully", Empty::default())
}

pub async fn my_reviews(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<PageQuery>,
) -> ApiResult<ReviewList> {
    review_list(ReviewService::new(&state).list_for_user(&claims, query).await?)
}

pub async fn service_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ReviewList> {
    review_list(ReviewService::new(&state).list_for_service(id, query).await?)
}

pub async fn lawyer_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ReviewList> {
    review_list(ReviewService::new(&state).list_for_lawyer(id, query).await?)
}
