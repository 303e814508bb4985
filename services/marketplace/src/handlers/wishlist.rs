use axum::{
    extract::{Path, State},
    Json,
};
use pocketlegal_auth::Claims;
use pocketlegal_common::Empty;
use uuid::Uuid;

use super::{created, ok, ok_with, ApiResult};
use crate::models::*;
use crate::services::{AppState, WishlistService};

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<AddToWishlistRequest>,
) -> ApiResult<WishlistItemPayload> {
    let item = WishlistService::new(&state).add(&claims, request).await?;
    created("Item added to wishlist", WishlistItemPayload { item })
}

pub async fn get_wishlist(State(state): State<AppState>, claims: Claims) -> ApiResult<WishlistPayload> {
    ok(WishlistService::new(&state).list(&claims).await?)
}

pub async fn remove_wishlist_item(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> ApiResult<Empty> {
    WishlistService::new(&state).remove(&claims, id).await?;
    ok_with("Item removed from wishlist", Empty::default())
}

pub async fn clear_wishlist(State(state): State<AppState>, claims: Claims) -> ApiResult<CountPayload> {
    let count = WishlistService::new(&state).clear(&claims).await?;
    ok_with("Wishlist cleared", CountPayload { count })
}
