use axum::{
    extract::{Path, Query, State},
    Json,
};
use pocketlegal_auth::Claims;
use pocketlegal_common::{Page, PageRequest};
use pocketlegal_database::Booking;
use uuid::Uuid;
use validator::Validate;

use super::{created, ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, BookingService};

fn booking_list((page, request): (Page<Booking>, PageRequest)) -> ApiResult<BookingList> {
    ok(BookingList {
        meta: PageMeta::new(&page, request),
        bookings: page.items,
    })
}

pub async fn create_booking(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateBookingRequest>,
) -> ApiResult<BookingPayload> {
    request.validate().map_err(validation_error)?;
    let booking = BookingService::new(&state)
        .create_booking(&claims, request)
        .await?;
    created("Booking created successfully", BookingPayload { booking })
}

pub async fn checkout(
    State(state): State<AppState>,
    claims: Claims,
    body: Option<Json<CheckoutRequest>>,
) -> ApiResult<CheckoutPayload> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    request.validate().map_err(validation_error)?;
    let payload = BookingService::new(&state).checkout(&claims, request).await?;
    created("Bookings created successfully", payload)
}

pub async fn my_bookings(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<BookingQuery>,
) -> ApiResult<BookingList> {
    booking_list(
        BookingService::new(&state)
            .list_customer_bookings(&claims, query)
            .await?,
    )
}

pub async fn lawyer_bookings(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<BookingQuery>,
) -> ApiResult<BookingList> {
    booking_list(
        BookingService::new(&state)
            .list_lawyer_bookings(&claims, query)
            .await?,
    )
}

pub async fn get_booking(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<BookingPayload> {
    let booking = BookingService::new(&state).get_booking(&claims, id).await?;
    ok(BookingPayload { booking })
}

pub async fn update_status(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<BookingPayload> {
    request.validate().map_err(validation_error)?;
    let booking = BookingService::new(&state)
        .update_status(&claims, id, request)
        .await?;
    ok_with(
        format!("Booking status updated to {}", booking.status),
        BookingPayload { booking },
    )
}

pub async fn reschedule(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> ApiResult<ReschedulePayload> {
    request.validate().map_err(validation_error)?;
    let (booking, original_booking) = BookingService::new(&state)
        .reschedule(&claims, id, request)
        .await?;
    ok_with(
        "Booking rescheduled successfully",
        ReschedulePayload {
            booking,
            original_booking,
        },
    )
}
