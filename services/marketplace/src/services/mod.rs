mod booking;
mod cart;
mod catalog;
mod dispatcher;
#[cfg(test)]
mod fixtures;
mod gateway;
mod notification;
mod payment;
mod review;
mod user;
mod wishlist;

pub use booking::BookingService;
pub use cart::{CartService, PricedLine};
pub use catalog::CatalogService;
pub use dispatcher::{
    BookingEvent, NotificationDispatcher, NotificationEvent, PaymentEvent,
};
pub use gateway::{
    gateway_from_config, ChargeOutcome, ChargeRequest, DemoGateway, PaymentGateway,
    SimulatedGateway,
};
pub use notification::NotificationService;
pub use payment::PaymentService;
pub use review::ReviewService;
pub use user::UserService;
pub use wishlist::WishlistService;

use std::sync::Arc;

use pocketlegal_auth::JwtService;
use pocketlegal_database::{MemoryStore, Store};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt_service: Arc<JwtService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: NotificationDispatcher,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires the shared services around `store` and starts the notification
    /// worker. Must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let notifier =
            NotificationDispatcher::spawn(store.clone(), config.notifications.queue_capacity);

        Self {
            jwt_service: Arc::new(JwtService::new(&config.jwt)),
            gateway: gateway_from_config(&config.payment),
            notifier,
            store,
            config: Arc::new(config),
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }
}
