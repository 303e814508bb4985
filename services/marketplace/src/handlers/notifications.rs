use axum::extract::{Path, Query, State};
use pocketlegal_auth::Claims;
use pocketlegal_common::Empty;
use uuid::Uuid;

use super::{ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, NotificationService};

pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<NotificationList> {
    ok(NotificationService::new(&state).list(&claims, query).await?)
}

pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<NotificationPayload> {
    let notification = NotificationService::new(&state).mark_read(&claims, id).await?;
    ok_with("Notification marked as read", NotificationPayload { notification })
}

pub async fn mark_all_read(State(state): State<AppState>, claims: Claims) -> ApiResult<CountPayload> {
    let count = NotificationService::new(&state).mark_all_read(&claims).await?;
    ok_with("All notifications marked as read", CountPayload { count })
}

pub async fn delete_notification(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<Empty> {
    NotificationService::new(&state).delete(&claims, id).await?;
    ok_with("Notification deleted", Empty::default())
}

pub async fn clear_notifications(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<CountPayload> {
    let count = NotificationService::new(&state).clear(&claims).await?;
    ok_with("All notifications deleted", CountPayload { count })
}
