use axum::{
    extract::{Path, Query, State},
    Json,
};
use pocketlegal_auth::Claims;
use pocketlegal_common::{Page, PageRequest};
use pocketlegal_database::Payment;
use uuid::Uuid;
use validator::Validate;

use super::{ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, PaymentService};

fn payment_list((page, request): (Page<Payment>, PageRequest)) -> ApiResult<PaymentList> {
    ok(PaymentList {
        meta: PageMeta::new(&page, request),
        payments: page.items,
    })
}

pub async fn process_payment(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<ProcessPaymentRequest>,
) -> ApiResult<PaymentPayload> {
    let (payment, booking) = PaymentService::new(&state)
        .process_payment(&claims, request)
        .await?;
    ok_with(
        "Payment processed successfully",
        PaymentPayload {
            payment,
            booking: Some(booking),
        },
    )
}

pub async fn refund(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<RefundRequest>,
) -> ApiResult<PaymentPayload> {
    request.validate().map_err(validation_error)?;
    let (payment, booking) = PaymentService::new(&state).refund(&claims, request).await?;
    ok_with(
        "Refund processed successfully",
        PaymentPayload {
            payment,
            booking: Some(booking),
        },
    )
}

pub async fn my_payments(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<PaymentList> {
    payment_list(
        PaymentService::new(&state)
            .list_customer_payments(&claims, query)
            .await?,
    )
}

pub async fn lawyer_payments(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<PaymentList> {
    payment_list(
        PaymentService::new(&state)
            .list_lawyer_payments(&claims, query)
            .await?,
    )
}

pub async fn get_payment(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<PaymentPayload> {
    ok(PaymentService::new(&state).get_payment(&claims, id).await?)
}
