use axum::{
    extract::{Path, State},
    Json,
};
use pocketlegal_auth::Claims;
use pocketlegal_common::Empty;
use uuid::Uuid;
use validator::Validate;

use super::{created, ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, CartService};

pub async fn add_to_cart(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<AddToCartRequest>,
) -> ApiResult<CartItemPayload> {
    request.validate().map_err(validation_error)?;
    let item = CartService::new(&state).add(&claims, request).await?;
    created("Item added to cart", CartItemPayload { item })
}

pub async fn get_cart(State(state): State<AppState>, claims: Claims) -> ApiResult<CartPayload> {
    ok(CartService::new(&state).list(&claims).await?)
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCartItemRequest>,
) -> ApiResult<CartItemPayload> {
    request.validate().map_err(validation_error)?;
    let item = CartService::new(&state).update(&claims, id, request).await?;
    ok_with("Cart item updated", CartItemPayload { item })
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<Empty> {
    CartService::new(&state).remove(&claims, id).await?;
    ok_with("Item removed from cart", Empty::default())
}

pub async fn clear_cart(State(state): State<AppState>, claims: Claims) -> ApiResult<CountPayload> {
    let count = CartService::new(&state).clear(&claims).await?;
    ok_with("Cart cleared", CountPayload { count })
}
