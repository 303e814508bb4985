use std::sync::Arc;

use chrono::NaiveTime;
use pocketlegal_auth::Claims;
use pocketlegal_common::AppError;
use pocketlegal_database::{
    CartItem, CartItemUpdate, CartStore, CatalogStore, Lawyer, LawyerStore, NewCartItem, Service,
    Store,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::*;

/// A cart line with its service, the lawyer who will take it, and its price.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub item: CartItem,
    pub service: Service,
    pub lawyer: Option<Lawyer>,
    pub line_total: Decimal,
}

impl PricedLine {
    /// Price of one session: the service's base price plus the lawyer's rate.
    pub fn unit_price(service: &Service, lawyer: Option<&Lawyer>) -> Decimal {
        service.base_price + lawyer.map_or(Decimal::ZERO, |l| l.hourly_rate)
    }
}

/// Resolves the service and lawyer behind `item`. Without an explicit lawyer
/// the first existing lawyer offering the service is used.
pub(crate) async fn resolve_line(store: &dyn Store, item: CartItem) -> Result<PricedLine, AppError> {
    let service = store
        .find_service(item.service_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {} not found", item.service_id)))?;

    let lawyer = match item.lawyer_id {
        Some(lawyer_id) => Some(
            store
                .find_lawyer(lawyer_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Lawyer {} not found", lawyer_id)))?,
        ),
        None => {
            let mut found = None;
            for lawyer_id in &service.lawyers {
                if let Some(lawyer) = store.find_lawyer(*lawyer_id).await? {
                    found = Some(lawyer);
                    break;
                }
            }
            found
        }
    };

    let line_total = PricedLine::unit_price(&service, lawyer.as_ref()) * Decimal::from(item.quantity);
    Ok(PricedLine {
        item,
        service,
        lawyer,
        line_total,
    })
}

/// Parses `HH:MM-HH:MM`. The end must come after the start.
pub(crate) fn parse_time_slot(slot: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (start, end) = slot.split_once('-')?;
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
    (end > start).then_some((start, end))
}

fn check_time_slot(slot: Option<&str>) -> Result<(), AppError> {
    match slot {
        Some(slot) if parse_time_slot(slot).is_none() => Err(AppError::Validation(
            "preferredTimeSlot must be formatted as HH:MM-HH:MM".to_string(),
        )),
        _ => Ok(()),
    }
}

pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn add(&self, claims: &Claims, request: AddToCartRequest) -> Result<CartItem, AppError> {
        check_time_slot(request.preferred_time_slot.as_deref())?;

        let service = self
            .store
            .find_service(request.service_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;
        if !service.is_active {
            return Err(AppError::Validation(
                "Service is not currently available".to_string(),
            ));
        }

        if let Some(lawyer_id) = request.lawyer_id {
            if self.store.find_lawyer(lawyer_id).await?.is_none() {
                return Err(AppError::NotFound("Lawyer not found".to_string()));
            }
            if !service.is_offered_by(lawyer_id) {
                return Err(AppError::Validation(
                    "This lawyer does not offer the selected service".to_string(),
                ));
            }
        }

        let item = self
            .store
            .upsert_cart_item(NewCartItem {
                user_id: claims.user_id()?,
                service_id: service.id,
                lawyer_id: request.lawyer_id,
                quantity: request.quantity.unwrap_or(1),
                preferred_date: request.preferred_date,
                preferred_time_slot: request.preferred_time_slot,
                notes: request.notes,
            })
            .await?;
        tracing::debug!(cart_item_id = %item.id, "Cart item saved");
        Ok(item)
    }

    pub async fn list(&self, claims: &Claims) -> Result<CartPayload, AppError> {
        let lines = self.priced_lines(claims.user_id()?).await?;
        let total_amount = lines.iter().map(|l| l.line_total).sum();
        let items: Vec<CartItem> = lines.into_iter().map(|l| l.item).collect();

        Ok(CartPayload {
            count: items.len(),
            total_amount,
            items,
        })
    }

    pub async fn update(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateCartItemRequest,
    ) -> Result<CartItem, AppError> {
        check_time_slot(request.preferred_time_slot.as_deref())?;

        let update = CartItemUpdate {
            quantity: request.quantity,
            preferred_date: request.preferred_date,
            preferred_time_slot: request.preferred_time_slot,
            notes: request.notes,
        };
        self.store
            .update_cart_item(claims.user_id()?, id, update)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))
    }

    pub async fn remove(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        if !self.store.remove_cart_item(claims.user_id()?, id).await? {
            return Err(AppError::NotFound("Cart item not found".to_string()));
        }
        Ok(())
    }

    pub async fn clear(&self, claims: &Claims) -> Result<u64, AppError> {
        self.store.clear_cart(claims.user_id()?).await
    }

    /// Every line of `user_id`'s cart, priced, in insertion order.
    pub async fn priced_lines(&self, user_id: Uuid) -> Result<Vec<PricedLine>, AppError> {
        let items = self.store.list_cart(user_id).await?;
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            lines.push(resolve_line(self.store.as_ref(), item).await?);
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::Fixture;

    fn add_request(service_id: Uuid, lawyer_id: Option<Uuid>, quantity: i32) -> AddToCartRequest {
        AddToCartRequest {
            service_id,
            lawyer_id,
            quantity: Some(quantity),
            preferred_date: None,
            preferred_time_slot: None,
            notes: None,
        }
    }

    #[test]
    fn test_parse_time_slot() {
        let (start, end) = parse_time_slot("14:00-15:30").unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(15, 30, 0).unwrap());

        assert!(parse_time_slot("15:00-14:00").is_none());
        assert!(parse_time_slot("morning").is_none());
        assert!(parse_time_slot("25:00-26:00").is_none());
    }

    #[tokio::test]
    async fn test_cart_total_includes_lawyer_rate_and_quantity() {
        let fx = Fixture::new().await;
        let cart = CartService::new(&fx.state);

        cart.add(&fx.customer, add_request(fx.service.id, Some(fx.lawyer_profile.id), 2))
            .await
            .unwrap();

        let payload = cart.list(&fx.customer).await.unwrap();
        assert_eq!(payload.count, 1);
        assert_eq!(payload.total_amount, Decimal::new(300, 0));
    }

    #[tokio::test]
    async fn test_readding_a_line_updates_it() {
        let fx = Fixture::new().await;
        let cart = CartService::new(&fx.state);

        let first = cart
            .add(&fx.customer, add_request(fx.service.id, None, 1))
            .await
            .unwrap();
        let second = cart
            .add(&fx.customer, add_request(fx.service.id, None, 3))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
        assert_eq!(cart.list(&fx.customer).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_unknown_lawyer_and_foreign_lines_are_not_found() {
        let fx = Fixture::new().await;
        let other = fx.stranger().await;
        let cart = CartService::new(&fx.state);

        let err = cart
            .add(&fx.customer, add_request(fx.service.id, Some(Uuid::new_v4()), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let item = cart
            .add(&fx.customer, add_request(fx.service.id, None, 1))
            .await
            .unwrap();
        let err = cart.remove(&other, item.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        cart.remove(&fx.customer, item.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_time_slot_is_rejected() {
        let fx = Fixture::new().await;
        let mut request = add_request(fx.service.id, None, 1);
        request.preferred_time_slot = Some("9am".into());

        let err = CartService::new(&fx.state)
            .add(&fx.customer, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
