use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pocketlegal_common::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lawyer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub qualifications: Vec<String>,
    pub experience: i32,
    pub areas_of_expertise: Vec<String>,
    pub license_number: Option<String>,
    pub license_issued_by: Option<String>,
    pub license_expiry_date: Option<NaiveDate>,
    pub bio: Option<String>,
    pub hourly_rate: Decimal,
    pub languages: Vec<String>,
    pub rating: f64,
    pub number_of_ratings: i32,
    pub is_verified: bool,
    pub documents_verified: bool,
    pub documents_uploaded_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub parent_category: Option<Uuid>,
    pub order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category_id: Uuid,
    pub base_price: Decimal,
    /// Minutes.
    pub duration: i32,
    pub is_active: bool,
    pub lawyers: Vec<Uuid>,
    pub rating: f64,
    pub number_of_ratings: i32,
    pub tags: Vec<String>,
    pub featured: bool,
    pub popularity_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn is_offered_by(&self, lawyer_id: Uuid) -> bool {
        self.lawyers.contains(&lawyer_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub lawyer_id: Uuid,
    pub service_id: Uuid,
    pub status: BookingStatus,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_amount: Decimal,
    pub payment_status: BookingPaymentStatus,
    pub payment_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub customer_notes: Option<String>,
    pub lawyer_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub is_rescheduled: bool,
    pub original_booking_id: Option<Uuid>,
    pub is_reviewed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub lawyer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub refunded_amount: Decimal,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub lawyer_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub lawyer_id: Option<Uuid>,
    pub quantity: i32,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time_slot: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub related_id: Option<Uuid>,
    pub related_model: Option<RelatedModel>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
    pub priority: NotificationPriority,
    pub created_at: DateTime<Utc>,
}

// Write models

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LawyerUpdate {
    pub qualifications: Option<Vec<String>>,
    pub experience: Option<i32>,
    pub areas_of_expertise: Option<Vec<String>>,
    pub license_number: Option<String>,
    pub license_issued_by: Option<String>,
    pub license_expiry_date: Option<NaiveDate>,
    pub bio: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub languages: Option<Vec<String>>,
    pub documents_uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LawyerFilter {
    pub expertise: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub parent_category: Option<Uuid>,
    pub order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub parent_category: Option<Uuid>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub category_id: Uuid,
    pub base_price: Decimal,
    pub duration: i32,
    pub lawyers: Vec<Uuid>,
    pub tags: Vec<String>,
    pub featured: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category_id: Option<Uuid>,
    pub base_price: Option<Decimal>,
    pub duration: Option<i32>,
    pub is_active: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Popularity,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: ServiceSort,
}

#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub lawyer_id: Option<Uuid>,
    pub quantity: i32,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time_slot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CartItemUpdate {
    pub quantity: Option<i32>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time_slot: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewWishlistItem {
    pub user_id: Uuid,
    pub service_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: Uuid,
    pub lawyer_id: Uuid,
    pub service_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_amount: Decimal,
    pub payment_status: BookingPaymentStatus,
    pub payment_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub customer_notes: Option<String>,
    pub lawyer_notes: Option<String>,
    pub original_booking_id: Option<Uuid>,
}

/// Which notes column a caller's note lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Customer,
    Lawyer,
    General,
}

impl From<UserRole> for NoteField {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Customer => NoteField::Customer,
            UserRole::Lawyer => NoteField::Lawyer,
            UserRole::Admin => NoteField::General,
        }
    }
}

/// Conditional status write: applied only while the booking is still in
/// `expected`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: BookingStatus,
    pub status: BookingStatus,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub note: Option<(NoteField, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub customer_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct PaymentSettlement {
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub lawyer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub customer_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub lawyer_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewUpdate {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub user_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub published_only: bool,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub related_id: Option<Uuid>,
    pub related_model: Option<RelatedModel>,
    pub action_url: Option<String>,
    pub priority: NotificationPriority,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub notification_type: Option<NotificationType>,
    pub priority: Option<NotificationPriority>,
}

/// Aggregate rating over a full set of review scores. No reviews yields 0.
pub fn mean_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    sum as f64 / ratings.len() as f64
}
