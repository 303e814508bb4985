use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use pocketlegal_common::{
    AppError, BookingStatus, NotificationPriority, NotificationType, Page, PageRequest,
    PaymentMethod, PaymentStatus, UserRole,
};
use pocketlegal_database::{
    Booking, CartItem, Category, Lawyer, Notification, Payment, Review, Service, ServiceSort,
    User, WishlistItem,
};

/// Flattens validator output into a single `Validation` error.
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let detail = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {}", field, detail)
        })
        .collect();
    fields.sort();
    AppError::Validation(format!("Validation failed: {}", fields.join("; ")))
}

fn non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("non_positive_amount"));
    }
    Ok(())
}

// Pagination

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub count: usize,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u32,
}

impl PageMeta {
    pub fn new<T>(page: &Page<T>, request: PageRequest) -> Self {
        Self {
            count: page.items.len(),
            total: page.total,
            total_pages: request.total_pages(page.total),
            current_page: request.page,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountPayload {
    pub count: u64,
}

// Users

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6))]
    pub password: String,

    pub role: Option<UserRole>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPayload {
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lawyer: Option<Lawyer>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[validate(url)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,

    #[validate(length(min = 6))]
    pub new_password: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLawyerProfileRequest {
    pub qualifications: Option<Vec<String>>,

    #[validate(range(min = 0, max = 80))]
    pub experience: Option<i32>,

    pub areas_of_expertise: Option<Vec<String>>,
    pub license_number: Option<String>,
    pub license_issued_by: Option<String>,
    pub license_expiry_date: Option<NaiveDate>,

    #[validate(length(max = 2000))]
    pub bio: Option<String>,

    #[validate(custom = "non_negative_amount")]
    pub hourly_rate: Option<Decimal>,

    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LawyerQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub expertise: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LawyerPayload {
    pub lawyer: Lawyer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LawyerList {
    #[serde(flatten)]
    pub meta: PageMeta,
    pub lawyers: Vec<Lawyer>,
}

// Catalog

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub icon: Option<String>,
    pub parent_category: Option<Uuid>,
    pub order: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub icon: Option<String>,
    pub parent_category: Option<Uuid>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryPayload {
    pub category: Category,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryList {
    pub count: usize,
    pub categories: Vec<Category>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: Option<ServiceSort>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(length(min = 10, max = 2000))]
    pub description: String,

    #[validate(length(max = 200))]
    pub short_description: Option<String>,

    pub category_id: Uuid,

    #[validate(custom = "non_negative_amount")]
    pub base_price: Decimal,

    /// Minutes.
    #[validate(range(min = 15, max = 480))]
    pub duration: Option<i32>,

    #[serde(default)]
    pub lawyers: Vec<Uuid>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,

    #[validate(length(min = 10, max = 2000))]
    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub short_description: Option<String>,

    pub category_id: Option<Uuid>,

    #[validate(custom = "non_negative_amount")]
    pub base_price: Option<Decimal>,

    #[validate(range(min = 15, max = 480))]
    pub duration: Option<i32>,

    pub is_active: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignLawyersRequest {
    pub lawyers: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServicePayload {
    pub service: Service,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceList {
    #[serde(flatten)]
    pub meta: PageMeta,
    pub services: Vec<Service>,
}

// Cart & wishlist

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub service_id: Uuid,
    pub lawyer_id: Option<Uuid>,

    #[validate(range(min = 1, max = 10))]
    pub quantity: Option<i32>,

    pub preferred_date: Option<NaiveDate>,

    /// `HH:MM-HH:MM`.
    pub preferred_time_slot: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, max = 10))]
    pub quantity: Option<i32>,

    pub preferred_date: Option<NaiveDate>,
    pub preferred_time_slot: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPayload {
    pub count: usize,
    pub total_amount: Decimal,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartItemPayload {
    pub item: CartItem,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToWishlistRequest {
    pub service_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WishlistPayload {
    pub count: usize,
    pub items: Vec<WishlistItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WishlistItemPayload {
    pub item: WishlistItem,
}

// Bookings

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub service_id: Uuid,
    pub lawyer_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub payment_method: Option<PaymentMethod>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub total_amount: Decimal,
    pub booking_count: usize,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,

    #[validate(length(max = 500))]
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<BookingStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingPayload {
    pub booking: Booking,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReschedulePayload {
    pub booking: Booking,
    pub original_booking: Booking,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingList {
    #[serde(flatten)]
    pub meta: PageMeta,
    pub bookings: Vec<Booking>,
}

// Payments

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub booking_id: Uuid,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub payment_id: Uuid,

    #[validate(custom = "positive_amount")]
    pub amount: Option<Decimal>,

    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub payment: Payment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<Booking>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentList {
    #[serde(flatten)]
    pub meta: PageMeta,
    pub payments: Vec<Payment>,
}

// Reviews

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,

    #[validate(range(min = 1, max = 5))]
    pub rating: i32,

    #[validate(length(min = 2, max = 1000))]
    pub comment: Option<String>,

    pub lawyer_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,

    #[validate(length(min = 2, max = 1000))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub review: Review,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewList {
    #[serde(flatten)]
    pub meta: PageMeta,
    pub reviews: Vec<Review>,
}

// Notifications

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub is_read: Option<bool>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub notification: Notification,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    #[serde(flatten)]
    pub meta: PageMeta,
    pub unread_count: u64,
    pub notifications: Vec<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            name: "A".into(),
            email: "not-an-email".into(),
            password: "123".into(),
            role: None,
            phone: None,
        };
        let err = validation_error(request.validate().unwrap_err());
        let AppError::Validation(message) = err else {
            panic!("expected a validation error");
        };
        assert!(message.contains("email"));
        assert!(message.contains("name"));
        assert!(message.contains("password"));
    }

    #[test]
    fn test_refund_amount_must_be_positive() {
        let request = RefundRequest {
            payment_id: Uuid::new_v4(),
            amount: Some(Decimal::ZERO),
            reason: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_page_meta_counts_pages() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 23,
        };
        let meta = PageMeta::new(&page, PageRequest::new(Some(3), Some(10)));
        assert_eq!(meta.count, 3);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.current_page, 3);
    }
}
