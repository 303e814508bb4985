use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pocketlegal_common::AppError;
use sqlx::FromRow;
use uuid::Uuid;

use super::{convert_rows, PgStore};
use crate::models::*;
use crate::store::CartStore;

const CART_COLUMNS: &str = "id, user_id, service_id, lawyer_id, quantity, preferred_date, \
                            preferred_time_slot, notes, created_at, updated_at";

const WISHLIST_COLUMNS: &str = "id, user_id, service_id, lawyer_id, created_at";

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    service_id: Uuid,
    lawyer_id: Option<Uuid>,
    quantity: i32,
    preferred_date: Option<NaiveDate>,
    preferred_time_slot: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for CartItem {
    type Error = AppError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        Ok(CartItem {
            id: row.id,
            user_id: row.user_id,
            service_id: row.service_id,
            lawyer_id: row.lawyer_id,
            quantity: row.quantity,
            preferred_date: row.preferred_date,
            preferred_time_slot: row.preferred_time_slot,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct WishlistRow {
    id: Uuid,
    user_id: Uuid,
    service_id: Option<Uuid>,
    lawyer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WishlistRow> for WishlistItem {
    type Error = AppError;

    fn try_from(row: WishlistRow) -> Result<Self, Self::Error> {
        Ok(WishlistItem {
            id: row.id,
            user_id: row.user_id,
            service_id: row.service_id,
            lawyer_id: row.lawyer_id,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, AppError> {
        let rows: Vec<CartRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cart_items WHERE user_id = $1 ORDER BY created_at, id",
            CART_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }

    async fn upsert_cart_item(&self, new: NewCartItem) -> Result<CartItem, AppError> {
        let row: CartRow = sqlx::query_as(&format!(
            "INSERT INTO cart_items \
                (id, user_id, service_id, lawyer_id, quantity, preferred_date, preferred_time_slot, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (user_id, service_id, COALESCE(lawyer_id, '00000000-0000-0000-0000-000000000000'::uuid)) \
             DO UPDATE SET \
                quantity = EXCLUDED.quantity, \
                preferred_date = COALESCE(EXCLUDED.preferred_date, cart_items.preferred_date), \
                preferred_time_slot = COALESCE(EXCLUDED.preferred_time_slot, cart_items.preferred_time_slot), \
                notes = COALESCE(EXCLUDED.notes, cart_items.notes), \
                updated_at = NOW() \
             RETURNING {}",
            CART_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.service_id)
        .bind(new.lawyer_id)
        .bind(new.quantity)
        .bind(new.preferred_date)
        .bind(&new.preferred_time_slot)
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn update_cart_item(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: CartItemUpdate,
    ) -> Result<Option<CartItem>, AppError> {
        let row: Option<CartRow> = sqlx::query_as(&format!(
            "UPDATE cart_items SET \
                quantity = COALESCE($3, quantity), \
                preferred_date = COALESCE($4, preferred_date), \
                preferred_time_slot = COALESCE($5, preferred_time_slot), \
                notes = COALESCE($6, notes), \
                updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            CART_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(update.quantity)
        .bind(update.preferred_date)
        .bind(update.preferred_time_slot)
        .bind(update.notes)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CartItem::try_from).transpose()
    }

    async fn remove_cart_item(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistItem>, AppError> {
        let rows: Vec<WishlistRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC, id",
            WISHLIST_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }

    async fn add_wishlist_item(&self, new: NewWishlistItem) -> Result<WishlistItem, AppError> {
        let row: WishlistRow = sqlx::query_as(&format!(
            "INSERT INTO wishlist_items (id, user_id, service_id, lawyer_id) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            WISHLIST_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.service_id)
        .bind(new.lawyer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("Item is already in your wishlist".to_string())
            }
            other => other,
        })?;
        row.try_into()
    }

    async fn remove_wishlist_item(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_wishlist(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
