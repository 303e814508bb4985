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
use crate::services::{AppState, CatalogService};

// Categories

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<CategoryList> {
    let categories = CatalogService::new(&state).list_categories().await?;
    ok(CategoryList {
        count: categories.len(),
        categories,
    })
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CategoryPayload> {
    let category = CatalogService::new(&state).get_category(id).await?;
    ok(CategoryPayload { category })
}

pub async fn create_category(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateCategoryRequest>,
) -> ApiResult<CategoryPayload> {
    request.validate().map_err(validation_error)?;
    let category = CatalogService::new(&state)
        .create_category(&claims, request)
        .await?;
    created("Category created successfully", CategoryPayload { category })
}

pub async fn update_category(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCategoryRequest>,
) -> ApiResult<CategoryPayload> {
    request.validate().map_err(validation_error)?;
    let category = CatalogService::new(&state)
        .update_category(&claims, id, request)
        .await?;
    ok_with("Category updated successfully", CategoryPayload { category })
}

pub async fn delete_category(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<Empty> {
    CatalogService::new(&state).delete_category(&claims, id).await?;
    ok_with("Category deleted successfully", Empty::default())
}

// Services

pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceQuery>,
) -> ApiResult<ServiceList> {
    let (page, request) = CatalogService::new(&state).list_services(query).await?;
    ok(ServiceList {
        meta: PageMeta::new(&page, request),
        services: page.items,
    })
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ServicePayload> {
    let service = CatalogService::new(&state).view_service(id).await?;
    ok(ServicePayload { service })
}

pub async fn create_service(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateServiceRequest>,
) -> ApiResult<ServicePayload> {
    request.validate().map_err(validation_error)?;
    let service = CatalogService::new(&state)
        .create_service(&claims, request)
        .await?;
    created("Service created successfully", ServicePayload { service })
}

pub async fn update_service(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> ApiResult<ServicePayload> {
    request.validate().map_err(validation_error)?;
    let service = CatalogService::new(&state)
        .update_service(&claims, id, request)
        .await?;
    ok_with("Service updated successfully", ServicePayload { service })
}

pub async fn delete_service(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<Empty> {
    CatalogService::new(&state).delete_service(&claims, id).await?;
    ok_with("Service deleted successfully", Empty::default())
}

pub async fn assign_lawyers(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignLawyersRequest>,
) -> ApiResult<ServicePayload> {
    let service = CatalogService::new(&state)
        .assign_lawyers(&claims, id, request)
        .await?;
    ok_with("Lawyers assigned successfully", ServicePayload { service })
}
