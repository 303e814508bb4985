//! Repository traits shared by the PostgreSQL and in-memory backends.
//!
//! Every method is one atomic unit: multi-row operations (checkout,
//! reschedule, payment settlement, refunds, review writes with their rating
//! recomputation) either apply completely or not at all.

use async_trait::async_trait;
use pocketlegal_common::{AppError, CancelledBy, Page, PageRequest};
use uuid::Uuid;

use crate::models::*;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts the user; a lawyer also gets an empty profile in the same write.
    async fn create_user(&self, new: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait LawyerStore: Send + Sync {
    async fn find_lawyer(&self, id: Uuid) -> Result<Option<Lawyer>, AppError>;
    async fn find_lawyer_by_user(&self, user_id: Uuid) -> Result<Option<Lawyer>, AppError>;
    async fn update_lawyer(&self, id: Uuid, update: LawyerUpdate) -> Result<Lawyer, AppError>;
    async fn list_lawyers(
        &self,
        filter: LawyerFilter,
        page: PageRequest,
    ) -> Result<Page<Lawyer>, AppError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError>;
    async fn create_category(&self, new: NewCategory) -> Result<Category, AppError>;
    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, AppError>;
    async fn delete_category(&self, id: Uuid) -> Result<bool, AppError>;

    async fn list_services(
        &self,
        filter: ServiceFilter,
        page: PageRequest,
    ) -> Result<Page<Service>, AppError>;
    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, AppError>;
    /// Reads a service and bumps its popularity score.
    async fn view_service(&self, id: Uuid) -> Result<Option<Service>, AppError>;
    async fn create_service(&self, new: NewService) -> Result<Service, AppError>;
    async fn update_service(&self, id: Uuid, update: ServiceUpdate) -> Result<Service, AppError>;
    async fn delete_service(&self, id: Uuid) -> Result<bool, AppError>;
    async fn set_service_lawyers(&self, id: Uuid, lawyers: Vec<Uuid>) -> Result<Service, AppError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, AppError>;
    /// Adds a line, or refreshes the existing (user, service, lawyer) line.
    async fn upsert_cart_item(&self, new: NewCartItem) -> Result<CartItem, AppError>;
    async fn update_cart_item(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: CartItemUpdate,
    ) -> Result<Option<CartItem>, AppError>;
    async fn remove_cart_item(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, AppError>;

    async fn list_wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistItem>, AppError>;
    async fn add_wishlist_item(&self, new: NewWishlistItem) -> Result<WishlistItem, AppError>;
    async fn remove_wishlist_item(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
    async fn clear_wishlist(&self, user_id: Uuid) -> Result<u64, AppError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, AppError>;
    /// Inserts every booking and empties the customer's cart.
    async fn checkout(
        &self,
        customer_id: Uuid,
        bookings: Vec<NewBooking>,
    ) -> Result<Vec<Booking>, AppError>;
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError>;
    /// Fails with `Conflict` when the booking has left `change.expected`.
    async fn update_booking_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Booking, AppError>;
    /// Cancels the still-open original and inserts its replacement.
    /// Returns `(original, replacement)`.
    async fn reschedule_booking(
        &self,
        original_id: Uuid,
        cancelled_by: CancelledBy,
        replacement: NewBooking,
    ) -> Result<(Booking, Booking), AppError>;
    async fn list_bookings(
        &self,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>, AppError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn find_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>, AppError>;
    /// Records a charge outcome and mirrors it onto the booking. An earlier
    /// pending or failed attempt is replaced; any other existing payment is a
    /// `Conflict`. A successful charge confirms a pending booking.
    async fn settle_payment(
        &self,
        settlement: PaymentSettlement,
    ) -> Result<(Payment, Booking), AppError>;
    /// Applies a refund to a `success` payment and mirrors it onto the booking.
    async fn refund_payment(&self, refund: RefundRecord) -> Result<(Payment, Booking), AppError>;
    async fn list_payments(
        &self,
        filter: PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, AppError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Inserts the review, flags the booking as reviewed and recomputes the
    /// affected service and lawyer ratings.
    async fn create_review(&self, new: NewReview) -> Result<Review, AppError>;
    async fn find_review(&self, id: Uuid) -> Result<Option<Review>, AppError>;
    async fn update_review(&self, id: Uuid, update: ReviewUpdate) -> Result<Review, AppError>;
    /// Removes the review, clears the booking flag and recomputes ratings.
    async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, AppError>;
    async fn list_reviews(
        &self,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> Result<Page<Review>, AppError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, new: NewNotification) -> Result<Notification, AppError>;
    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError>;
    async fn count_unread(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, AppError>;
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;
    async fn clear_notifications(&self, user_id: Uuid) -> Result<u64, AppError>;
}

/// The full persistence surface used by the marketplace service.
pub trait Store:
    UserStore
    + LawyerStore
    + CatalogStore
    + CartStore
    + BookingStore
    + PaymentStore
    + ReviewStore
    + NotificationStore
{
}

impl<T> Store for T where
    T: UserStore
        + LawyerStore
        + CatalogStore
        + CartStore
        + BookingStore
        + PaymentStore
        + ReviewStore
        + NotificationStore
{
}
