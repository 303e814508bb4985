use axum::{
    extract::{Path, Query, State},
    Json,
};
use pocketlegal_auth::Claims;
use pocketlegal_common::Empty;
use uuid::Uuid;
use validator::Validate;

use super::{created, ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, UserService};

// Authentication

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<AuthPayload> {
    request.validate().map_err(validation_error)?;
    let payload = UserService::new(&state).register(request).await?;
    created("User registered successfully", payload)
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthPayload> {
    request.validate().map_err(validation_error)?;
    let payload = UserService::new(&state).login(request).await?;
    ok(payload)
}

// Profile

pub async fn get_profile(State(state): State<AppState>, claims: Claims) -> ApiResult<ProfilePayload> {
    ok(UserService::new(&state).profile(&claims).await?)
}

pub async fn update_profile(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserPayload> {
    request.validate().map_err(validation_error)?;
    let user = UserService::new(&state).update_profile(&claims, request).await?;
    ok_with("Profile updated successfully", UserPayload { user })
}

pub async fn update_password(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<UpdatePasswordRequest>,
) -> ApiResult<Empty> {
    request.validate().map_err(validation_error)?;
    UserService::new(&state).update_password(&claims, request).await?;
    ok_with("Password updated successfully", Empty::default())
}

pub async fn update_lawyer_profile(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<UpdateLawyerProfileRequest>,
) -> ApiResult<LawyerPayload> {
    request.validate().map_err(validation_error)?;
    let lawyer = UserService::new(&state)
        .update_lawyer_profile(&claims, request)
        .await?;
    ok_with(
        "Lawyer profile updated successfully",
        LawyerPayload { lawyer, user: None },
    )
}

pub async fn update_lawyer_documents(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<LawyerPayload> {
    let lawyer = UserService::new(&state)
        .update_lawyer_documents(&claims)
        .await?;
    ok_with(
        "Documents uploaded successfully",
        LawyerPayload { lawyer, user: None },
    )
}

// Lawyer directory

pub async fn list_lawyers(
    State(state): State<AppState>,
    Query(query): Query<LawyerQuery>,
) -> ApiResult<LawyerList> {
    let (page, request) = UserService::new(&state).list_lawyers(query).await?;
    ok(LawyerList {
        meta: PageMeta::new(&page, request),
        lawyers: page.items,
    })
}

pub async fn get_lawyer(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<LawyerPayload> {
    ok(UserService::new(&state).get_lawyer(id).await?)
}
