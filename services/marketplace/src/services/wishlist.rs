use std::sync::Arc;

use pocketlegal_auth::Claims;
use pocketlegal_common::AppError;
use pocketlegal_database::{CartStore, CatalogStore, LawyerStore, NewWishlistItem, Store, WishlistItem};
use uuid::Uuid;

use crate::models::*;

pub struct WishlistService {
    store: Arc<dyn Store>,
}

impl WishlistService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn add(
        &self,
        claims: &Claims,
        request: AddToWishlistRequest,
    ) -> Result<WishlistItem, AppError> {
        if request.service_id.is_none() && request.lawyer_id.is_none() {
            return Err(AppError::Validation(
                "Please provide a service or lawyer to add to your wishlist".to_string(),
            ));
        }
        if let Some(service_id) = request.service_id {
            if self.store.find_service(service_id).await?.is_none() {
                return Err(AppError::NotFound("Service not found".to_string()));
            }
        }
        if let Some(lawyer_id) = request.lawyer_id {
            if self.store.find_lawyer(lawyer_id).await?.is_none() {
                return Err(AppError::NotFound("Lawyer not found".to_string()));
            }
        }

        self.store
            .add_wishlist_item(NewWishlistItem {
                user_id: claims.user_id()?,
                service_id: request.service_id,
                lawyer_id: request.lawyer_id,
            })
            .await
    }

    pub async fn list(&self, claims: &Claims) -> Result<WishlistPayload, AppError> {
        let items = self.store.list_wishlist(claims.user_id()?).await?;
        Ok(WishlistPayload {
            count: items.len(),
            items,
        })
    }

    pub async fn remove(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        if !self.store.remove_wishlist_item(claims.user_id()?, id).await? {
            return Err(AppError::NotFound("Wishlist item not found".to_string()));
        }
        Ok(())
    }

    pub async fn clear(&self, claims: &Claims) -> Result<u64, AppError> {
        self.store.clear_wishlist(claims.user_id()?).await
    }
}
