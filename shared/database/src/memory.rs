//! In-process backend behind a single `RwLock`. Every store call takes the
//! lock once, so multi-row operations are atomic with respect to each other.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pocketlegal_common::*;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::*;
use crate::store::*;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    lawyers: HashMap<Uuid, Lawyer>,
    categories: HashMap<Uuid, Category>,
    services: HashMap<Uuid, Service>,
    cart: HashMap<Uuid, CartItem>,
    wishlist: HashMap<Uuid, WishlistItem>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    reviews: HashMap<Uuid, Review>,
    notifications: HashMap<Uuid, Notification>,
}

impl Tables {
    fn insert_booking(&mut self, new: NewBooking) -> Booking {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            lawyer_id: new.lawyer_id,
            service_id: new.service_id,
            status: BookingStatus::Pending,
            booking_date: new.booking_date,
            start_time: new.start_time,
            end_time: new.end_time,
            total_amount: new.total_amount,
            payment_status: new.payment_status,
            payment_id: new.payment_id,
            payment_method: new.payment_method,
            notes: new.notes,
            customer_notes: new.customer_notes,
            lawyer_notes: new.lawyer_notes,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            is_rescheduled: new.original_booking_id.is_some(),
            original_booking_id: new.original_booking_id,
            is_reviewed: false,
            created_at: now,
            updated_at: now,
        };
        self.bookings.insert(booking.id, booking.clone());
        booking
    }

    fn recompute_ratings(&mut self, service_id: Option<Uuid>, lawyer_id: Option<Uuid>) {
        let now = Utc::now();
        if let Some(service_id) = service_id {
            let ratings: Vec<i32> = self
                .reviews
                .values()
                .filter(|r| r.service_id == Some(service_id))
                .map(|r| r.rating)
                .collect();
            if let Some(service) = self.services.get_mut(&service_id) {
                service.rating = mean_rating(&ratings);
                service.number_of_ratings = ratings.len() as i32;
                service.updated_at = now;
            }
        }
        if let Some(lawyer_id) = lawyer_id {
            let ratings: Vec<i32> = self
                .reviews
                .values()
                .filter(|r| r.lawyer_id == Some(lawyer_id))
                .map(|r| r.rating)
                .collect();
            if let Some(lawyer) = self.lawyers.get_mut(&lawyer_id) {
                lawyer.rating = mean_rating(&ratings);
                lawyer.number_of_ratings = ratings.len() as i32;
                lawyer.updated_at = now;
            }
        }
    }
}

/// Sorts newest first and cuts out the requested page.
fn newest_first_page<T, F>(mut items: Vec<T>, page: PageRequest, key: F) -> Page<T>
where
    F: Fn(&T) -> (chrono::DateTime<Utc>, Uuid),
{
    items.sort_by(|a, b| {
        let (a_at, a_id) = key(a);
        let (b_at, b_id) = key(b);
        b_at.cmp(&a_at).then(a_id.cmp(&b_id))
    });
    paginate(items, page)
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset())
        .take(page.limit as usize)
        .collect();
    Page { items, total }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes a user's role. Stands in for the operations CLI in tests.
    pub async fn set_user_role(&self, user_id: Uuid, role: UserRole) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(AppError::Conflict(
                "Duplicate record violates users_email_key".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: Some(new.password_hash),
            role: new.role,
            phone: new.phone,
            profile_picture: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        if user.role == UserRole::Lawyer {
            let lawyer = Lawyer {
                id: Uuid::new_v4(),
                user_id: user.id,
                qualifications: Vec::new(),
                experience: 0,
                areas_of_expertise: Vec::new(),
                license_number: None,
                license_issued_by: None,
                license_expiry_date: None,
                bio: None,
                hourly_rate: Decimal::ZERO,
                languages: Vec::new(),
                rating: 0.0,
                number_of_ratings: 0,
                is_verified: false,
                documents_verified: false,
                documents_uploaded_at: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            tables.lawyers.insert(lawyer.id, lawyer);
        }

        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(picture) = update.profile_picture {
            user.profile_picture = Some(picture);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl LawyerStore for MemoryStore {
    async fn find_lawyer(&self, id: Uuid) -> Result<Option<Lawyer>, AppError> {
        Ok(self.tables.read().await.lawyers.get(&id).cloned())
    }

    async fn find_lawyer_by_user(&self, user_id: Uuid) -> Result<Option<Lawyer>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .lawyers
            .values()
            .find(|l| l.user_id == user_id)
            .cloned())
    }

    async fn update_lawyer(&self, id: Uuid, update: LawyerUpdate) -> Result<Lawyer, AppError> {
        let mut tables = self.tables.write().await;
        let lawyer = tables
            .lawyers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Lawyer not found".to_string()))?;

        if let Some(v) = update.qualifications {
            lawyer.qualifications = v;
        }
        if let Some(v) = update.experience {
            lawyer.experience = v;
        }
        if let Some(v) = update.areas_of_expertise {
            lawyer.areas_of_expertise = v;
        }
        if let Some(v) = update.license_number {
            lawyer.license_number = Some(v);
        }
        if let Some(v) = update.license_issued_by {
            lawyer.license_issued_by = Some(v);
        }
        if let Some(v) = update.license_expiry_date {
            lawyer.license_expiry_date = Some(v);
        }
        if let Some(v) = update.bio {
            lawyer.bio = Some(v);
        }
        if let Some(v) = update.hourly_rate {
            lawyer.hourly_rate = v;
        }
        if let Some(v) = update.languages {
            lawyer.languages = v;
        }
        if let Some(v) = update.documents_uploaded_at {
            lawyer.documents_uploaded_at = Some(v);
        }
        lawyer.updated_at = Utc::now();
        Ok(lawyer.clone())
    }

    async fn list_lawyers(
        &self,
        filter: LawyerFilter,
        page: PageRequest,
    ) -> Result<Page<Lawyer>, AppError> {
        let tables = self.tables.read().await;
        let mut lawyers: Vec<Lawyer> = tables
            .lawyers
            .values()
            .filter(|l| l.is_active)
            .filter(|l| match &filter.expertise {
                Some(expertise) => l.areas_of_expertise.iter().any(|a| contains_ci(a, expertise)),
                None => true,
            })
            .cloned()
            .collect();

        lawyers.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(paginate(lawyers, page))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category, AppError> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| c.name == new.name) {
            return Err(AppError::Conflict(
                "Duplicate record violates categories_name_key".to_string(),
            ));
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            icon: new.icon,
            parent_category: new.parent_category,
            order: new.order,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(name) = &update.name {
            if tables.categories.values().any(|c| c.id != id && &c.name == name) {
                return Err(AppError::Conflict(
                    "Duplicate record violates categories_name_key".to_string(),
                ));
            }
        }

        let category = tables
            .categories
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        if let Some(v) = update.name {
            category.name = v;
        }
        if let Some(v) = update.description {
            category.description = Some(v);
        }
        if let Some(v) = update.icon {
            category.icon = Some(v);
        }
        if let Some(v) = update.parent_category {
            category.parent_category = Some(v);
        }
        if let Some(v) = update.order {
            category.order = v;
        }
        if let Some(v) = update.is_active {
            category.is_active = v;
        }
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.services.values().any(|s| s.category_id == id) {
            return Err(AppError::Conflict(
                "Category still has services assigned".to_string(),
            ));
        }
        Ok(tables.categories.remove(&id).is_some())
    }

    async fn list_services(
        &self,
        filter: ServiceFilter,
        page: PageRequest,
    ) -> Result<Page<Service>, AppError> {
        let tables = self.tables.read().await;
        let mut services: Vec<Service> = tables
            .services
            .values()
            .filter(|s| s.is_active)
            .filter(|s| filter.category_id.map_or(true, |c| s.category_id == c))
            .filter(|s| match &filter.search {
                Some(q) => {
                    contains_ci(&s.name, q)
                        || contains_ci(&s.description, q)
                        || s.tags.iter().any(|t| contains_ci(t, q))
                }
                None => true,
            })
            .filter(|s| filter.min_price.map_or(true, |p| s.base_price >= p))
            .filter(|s| filter.max_price.map_or(true, |p| s.base_price <= p))
            .filter(|s| filter.featured.map_or(true, |f| s.featured == f))
            .cloned()
            .collect();

        services.sort_by(|a, b| {
            let primary = match filter.sort {
                ServiceSort::Newest => b.created_at.cmp(&a.created_at),
                ServiceSort::PriceAsc => a.base_price.cmp(&b.base_price),
                ServiceSort::PriceDesc => b.base_price.cmp(&a.base_price),
                ServiceSort::Rating => b
                    .rating
                    .total_cmp(&a.rating)
                    .then(b.number_of_ratings.cmp(&a.number_of_ratings)),
                ServiceSort::Popularity => b.popularity_score.cmp(&a.popularity_score),
            };
            match primary {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            }
        });
        Ok(paginate(services, page))
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn view_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.services.get_mut(&id).map(|service| {
            service.popularity_score += 1;
            service.clone()
        }))
    }

    async fn create_service(&self, new: NewService) -> Result<Service, AppError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let service = Service {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            short_description: new.short_description,
            category_id: new.category_id,
            base_price: new.base_price,
            duration: new.duration,
            is_active: true,
            lawyers: new.lawyers,
            rating: 0.0,
            number_of_ratings: 0,
            tags: new.tags,
            featured: new.featured,
            popularity_score: 0,
            created_at: now,
            updated_at: now,
        };
        tables.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn update_service(&self, id: Uuid, update: ServiceUpdate) -> Result<Service, AppError> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

        if let Some(v) = update.name {
            service.name = v;
        }
        if let Some(v) = update.description {
            service.description = v;
        }
        if let Some(v) = update.short_description {
            service.short_description = Some(v);
        }
        if let Some(v) = update.category_id {
            service.category_id = v;
        }
        if let Some(v) = update.base_price {
            service.base_price = v;
        }
        if let Some(v) = update.duration {
            service.duration = v;
        }
        if let Some(v) = update.is_active {
            service.is_active = v;
        }
        if let Some(v) = update.tags {
            service.tags = v;
        }
        if let Some(v) = update.featured {
            service.featured = v;
        }
        service.updated_at = Utc::now();
        Ok(service.clone())
    }

    async fn delete_service(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.bookings.values().any(|b| b.service_id == id) {
            return Err(AppError::Conflict(
                "Record is still referenced (bookings_service_id_fkey)".to_string(),
            ));
        }
        let removed = tables.services.remove(&id).is_some();
        if removed {
            tables.cart.retain(|_, item| item.service_id != id);
            tables.wishlist.retain(|_, item| item.service_id != Some(id));
        }
        Ok(removed)
    }

    async fn set_service_lawyers(&self, id: Uuid, lawyers: Vec<Uuid>) -> Result<Service, AppError> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;
        service.lawyers = lawyers;
        service.updated_at = Utc::now();
        Ok(service.clone())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, AppError> {
        let tables = self.tables.read().await;
        let mut items: Vec<CartItem> = tables
            .cart
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn upsert_cart_item(&self, new: NewCartItem) -> Result<CartItem, AppError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables.cart.values_mut().find(|i| {
            i.user_id == new.user_id && i.service_id == new.service_id && i.lawyer_id == new.lawyer_id
        }) {
            existing.quantity = new.quantity;
            if new.preferred_date.is_some() {
                existing.preferred_date = new.preferred_date;
            }
            if new.preferred_time_slot.is_some() {
                existing.preferred_time_slot = new.preferred_time_slot;
            }
            if new.notes.is_some() {
                existing.notes = new.notes;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let item = CartItem {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            service_id: new.service_id,
            lawyer_id: new.lawyer_id,
            quantity: new.quantity,
            preferred_date: new.preferred_date,
            preferred_time_slot: new.preferred_time_slot,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };
        tables.cart.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_cart_item(
        &self,
        user_id: Uuid,
        id: Uuid,
        update: CartItemUpdate,
    ) -> Result<Option<CartItem>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(item) = tables.cart.get_mut(&id).filter(|i| i.user_id == user_id) else {
            return Ok(None);
        };

        if let Some(v) = update.quantity {
            item.quantity = v;
        }
        if let Some(v) = update.preferred_date {
            item.preferred_date = Some(v);
        }
        if let Some(v) = update.preferred_time_slot {
            item.preferred_time_slot = Some(v);
        }
        if let Some(v) = update.notes {
            item.notes = Some(v);
        }
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn remove_cart_item(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.cart.get(&id).is_some_and(|i| i.user_id == user_id) {
            tables.cart.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.cart.len();
        tables.cart.retain(|_, i| i.user_id != user_id);
        Ok((before - tables.cart.len()) as u64)
    }

    async fn list_wishlist(&self, user_id: Uuid) -> Result<Vec<WishlistItem>, AppError> {
        let tables = self.tables.read().await;
        let mut items: Vec<WishlistItem> = tables
            .wishlist
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn add_wishlist_item(&self, new: NewWishlistItem) -> Result<WishlistItem, AppError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.wishlist.values().any(|i| {
            i.user_id == new.user_id
                && ((new.service_id.is_some() && i.service_id == new.service_id)
                    || (new.lawyer_id.is_some() && i.lawyer_id == new.lawyer_id))
        });
        if duplicate {
            return Err(AppError::Conflict(
                "Item is already in your wishlist".to_string(),
            ));
        }

        let item = WishlistItem {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            service_id: new.service_id,
            lawyer_id: new.lawyer_id,
            created_at: Utc::now(),
        };
        tables.wishlist.insert(item.id, item.clone());
        Ok(item)
    }

    async fn remove_wishlist_item(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.wishlist.get(&id).is_some_and(|i| i.user_id == user_id) {
            tables.wishlist.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn clear_wishlist(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.wishlist.len();
        tables.wishlist.retain(|_, i| i.user_id != user_id);
        Ok((before - tables.wishlist.len()) as u64)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, AppError> {
        Ok(self.tables.write().await.insert_booking(new))
    }

    async fn checkout(
        &self,
        customer_id: Uuid,
        bookings: Vec<NewBooking>,
    ) -> Result<Vec<Booking>, AppError> {
        let mut tables = self.tables.write().await;
        let created = bookings
            .into_iter()
            .map(|new| tables.insert_booking(new))
            .collect();
        tables.cart.retain(|_, i| i.user_id != customer_id);
        Ok(created)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Booking, AppError> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.status != change.expected {
            return Err(AppError::Conflict(format!(
                "Booking is now {}, status was changed concurrently",
                booking.status
            )));
        }

        let now = Utc::now();
        booking.status = change.status;
        if let Some(by) = change.cancelled_by {
            booking.cancelled_by = Some(by);
            booking.cancelled_at = Some(now);
        }
        if let Some(reason) = change.cancellation_reason {
            booking.cancellation_reason = Some(reason);
        }
        match change.note {
            Some((NoteField::Customer, note)) => booking.customer_notes = Some(note),
            Some((NoteField::Lawyer, note)) => booking.lawyer_notes = Some(note),
            Some((NoteField::General, note)) => booking.notes = Some(note),
            None => {}
        }
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn reschedule_booking(
        &self,
        original_id: Uuid,
        cancelled_by: CancelledBy,
        replacement: NewBooking,
    ) -> Result<(Booking, Booking), AppError> {
        let mut tables = self.tables.write().await;
        let original = tables
            .bookings
            .get_mut(&original_id)
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if original.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Cannot reschedule a {} booking",
                original.status
            )));
        }

        let now = Utc::now();
        original.status = BookingStatus::Cancelled;
        original.cancellation_reason = Some("Rescheduled".to_string());
        original.cancelled_by = Some(cancelled_by);
        original.cancelled_at = Some(now);
        original.updated_at = now;
        let original = original.clone();

        let created = tables.insert_booking(replacement);
        // The payment follows the live booking so refunds and repeat
        // charges resolve against the replacement.
        if let Some(payment) = created.payment_id.and_then(|id| tables.payments.get_mut(&id)) {
            payment.booking_id = created.id;
            payment.updated_at = now;
        }
        Ok((original, created))
    }

    async fn list_bookings(
        &self,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>, AppError> {
        let tables = self.tables.read().await;
        let bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| filter.customer_id.map_or(true, |id| b.customer_id == id))
            .filter(|b| filter.lawyer_id.map_or(true, |id| b.lawyer_id == id))
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.from_date.map_or(true, |d| b.booking_date >= d))
            .filter(|b| filter.to_date.map_or(true, |d| b.booking_date <= d))
            .cloned()
            .collect();
        Ok(newest_first_page(bookings, page, |b| (b.created_at, b.id)))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn settle_payment(
        &self,
        settlement: PaymentSettlement,
    ) -> Result<(Payment, Booking), AppError> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.contains_key(&settlement.booking_id) {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }

        let now = Utc::now();
        let existing = tables
            .payments
            .values()
            .find(|p| p.booking_id == settlement.booking_id)
            .map(|p| (p.id, p.status, p.created_at));

        let (id, created_at) = match existing {
            Some((_, status, _))
                if !matches!(status, PaymentStatus::Pending | PaymentStatus::Failed) =>
            {
                return Err(AppError::Conflict(
                    "Payment already processed for this booking".to_string(),
                ));
            }
            Some((id, _, created_at)) => (id, created_at),
            None => (Uuid::new_v4(), now),
        };

        let payment = Payment {
            id,
            booking_id: settlement.booking_id,
            customer_id: settlement.customer_id,
            lawyer_id: settlement.lawyer_id,
            amount: settlement.amount,
            currency: settlement.currency,
            payment_method: settlement.payment_method,
            status: settlement.status,
            transaction_id: settlement.transaction_id,
            refunded_amount: Decimal::ZERO,
            refund_reason: None,
            refunded_at: None,
            created_at,
            updated_at: now,
        };
        tables.payments.insert(payment.id, payment.clone());

        let booking = tables
            .bookings
            .get_mut(&settlement.booking_id)
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        booking.payment_status = BookingPaymentStatus::from(payment.status);
        booking.payment_id = Some(payment.id);
        booking.payment_method = Some(payment.payment_method);
        if payment.status == PaymentStatus::Success && booking.status == BookingStatus::Pending {
            booking.status = BookingStatus::Confirmed;
        }
        booking.updated_at = now;

        Ok((payment, booking.clone()))
    }

    async fn refund_payment(&self, refund: RefundRecord) -> Result<(Payment, Booking), AppError> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get_mut(&refund.payment_id)
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status != PaymentStatus::Success {
            return Err(AppError::Conflict(format!(
                "Payment cannot be refunded in status {}",
                payment.status
            )));
        }

        let now = Utc::now();
        payment.status = refund.status;
        payment.refunded_amount = refund.amount;
        payment.refund_reason = refund.reason;
        payment.refunded_at = Some(now);
        payment.updated_at = now;
        let payment = payment.clone();

        let booking = tables
            .bookings
            .get_mut(&payment.booking_id)
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        booking.payment_status = BookingPaymentStatus::from(payment.status);
        booking.updated_at = now;

        Ok((payment, booking.clone()))
    }

    async fn list_payments(
        &self,
        filter: PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, AppError> {
        let tables = self.tables.read().await;
        let payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| filter.customer_id.map_or(true, |id| p.customer_id == id))
            .filter(|p| filter.lawyer_id.map_or(true, |id| p.lawyer_id == id))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        Ok(newest_first_page(payments, page, |p| (p.created_at, p.id)))
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn create_review(&self, new: NewReview) -> Result<Review, AppError> {
        let mut tables = self.tables.write().await;
        if tables.reviews.values().any(|r| r.booking_id == new.booking_id) {
            return Err(AppError::Conflict(
                "You have already reviewed this booking".to_string(),
            ));
        }

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            booking_id: new.booking_id,
            lawyer_id: new.lawyer_id,
            service_id: new.service_id,
            rating: new.rating,
            comment: new.comment,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        tables.reviews.insert(review.id, review.clone());

        if let Some(booking) = tables.bookings.get_mut(&review.booking_id) {
            booking.is_reviewed = true;
            booking.updated_at = now;
        }
        tables.recompute_ratings(review.service_id, review.lawyer_id);
        Ok(review)
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>, AppError> {
        Ok(self.tables.read().await.reviews.get(&id).cloned())
    }

    async fn update_review(&self, id: Uuid, update: ReviewUpdate) -> Result<Review, AppError> {
        let mut tables = self.tables.write().await;
        let review = tables
            .reviews
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        if let Some(rating) = update.rating {
            review.rating = rating;
        }
        if let Some(comment) = update.comment {
            review.comment = Some(comment);
        }
        review.updated_at = Utc::now();
        let review = review.clone();

        tables.recompute_ratings(review.service_id, review.lawyer_id);
        Ok(review)
    }

    async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(review) = tables.reviews.remove(&id) else {
            return Ok(None);
        };

        if let Some(booking) = tables.bookings.get_mut(&review.booking_id) {
            booking.is_reviewed = false;
            booking.updated_at = Utc::now();
        }
        tables.recompute_ratings(review.service_id, review.lawyer_id);
        Ok(Some(review))
    }

    async fn list_reviews(
        &self,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> Result<Page<Review>, AppError> {
        let tables = self.tables.read().await;
        let reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| filter.user_id.map_or(true, |id| r.user_id == id))
            .filter(|r| filter.lawyer_id.map_or(true, |id| r.lawyer_id == Some(id)))
            .filter(|r| filter.service_id.map_or(true, |id| r.service_id == Some(id)))
            .filter(|r| !filter.published_only || r.is_published)
            .cloned()
            .collect();
        Ok(newest_first_page(reviews, page, |r| (r.created_at, r.id)))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(&self, new: NewNotification) -> Result<Notification, AppError> {
        let mut tables = self.tables.write().await;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            notification_type: new.notification_type,
            related_id: new.related_id,
            related_model: new.related_model,
            is_read: false,
            read_at: None,
            action_url: new.action_url,
            priority: new.priority,
            created_at: Utc::now(),
        };
        tables.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        let tables = self.tables.read().await;
        let notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .filter(|n| filter.is_read.map_or(true, |r| n.is_read == r))
            .filter(|n| filter.notification_type.map_or(true, |t| n.notification_type == t))
            .filter(|n| filter.priority.map_or(true, |p| n.priority == p))
            .cloned()
            .collect();
        Ok(newest_first_page(notifications, page, |n| (n.created_at, n.id)))
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u64)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user_id)
            .map(|n| {
                if !n.is_read {
                    n.is_read = true;
                    n.read_at = Some(Utc::now());
                }
                n.clone()
            }))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for n in tables
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.notifications.get(&id).is_some_and(|n| n.user_id == user_id) {
            tables.notifications.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn clear_notifications(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.notifications.len();
        tables.notifications.retain(|_, n| n.user_id != user_id);
        Ok((before - tables.notifications.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    async fn seed_booking(store: &MemoryStore) -> (User, Lawyer, Service, Booking) {
        let customer = store
            .create_user(NewUser {
                name: "Cara".into(),
                email: "cara@example.com".into(),
                password_hash: "hash".into(),
                role: UserRole::Customer,
                phone: None,
            })
            .await
            .unwrap();
        let lawyer_user = store
            .create_user(NewUser {
                name: "Leo".into(),
                email: "leo@example.com".into(),
                password_hash: "hash".into(),
                role: UserRole::Lawyer,
                phone: None,
            })
            .await
            .unwrap();
        let lawyer = store.find_lawyer_by_user(lawyer_user.id).await.unwrap().unwrap();
        let category = store
            .create_category(NewCategory {
                name: "Family".into(),
                description: None,
                icon: None,
                parent_category: None,
                order: 0,
            })
            .await
            .unwrap();
        let service = store
            .create_service(NewService {
                name: "Divorce consult".into(),
                description: "One hour consult".into(),
                short_description: None,
                category_id: category.id,
                base_price: Decimal::new(100, 0),
                duration: 60,
                lawyers: vec![lawyer.id],
                tags: vec![],
                featured: false,
            })
            .await
            .unwrap();
        let booking = store
            .create_booking(NewBooking {
                customer_id: customer.id,
                lawyer_id: lawyer.id,
                service_id: service.id,
                booking_date: NaiveDate::from_ymd_opt(2030, 1, 2).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                total_amount: Decimal::new(150, 0),
                payment_status: BookingPaymentStatus::Pending,
                payment_id: None,
                payment_method: None,
                notes: None,
                customer_notes: None,
                lawyer_notes: None,
                original_booking_id: None,
            })
            .await
            .unwrap();
        (customer, lawyer, service, booking)
    }

    fn settlement(booking: &Booking, status: PaymentStatus) -> PaymentSettlement {
        PaymentSettlement {
            booking_id: booking.id,
            customer_id: booking.customer_id,
            lawyer_id: booking.lawyer_id,
            amount: booking.total_amount,
            currency: "USD".into(),
            payment_method: PaymentMethod::CreditCard,
            status,
            transaction_id: Some("DEMO_1".into()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        let (customer, ..) = seed_booking(&store).await;
        let err = store
            .create_user(NewUser {
                name: "Other".into(),
                email: customer.email.to_uppercase(),
                password_hash: "hash".into(),
                role: UserRole::Customer,
                phone: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_stale_status_change_is_rejected() {
        let store = MemoryStore::new();
        let (.., booking) = seed_booking(&store).await;

        let change = StatusChange {
            expected: BookingStatus::Pending,
            status: BookingStatus::Confirmed,
            cancelled_by: None,
            cancellation_reason: None,
            note: None,
        };
        store.update_booking_status(booking.id, change.clone()).await.unwrap();

        let err = store.update_booking_status(booking.id, change).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failed_attempt_is_replaced_by_success() {
        let store = MemoryStore::new();
        let (.., booking) = seed_booking(&store).await;

        let (failed, after_fail) = store
            .settle_payment(settlement(&booking, PaymentStatus::Failed))
            .await
            .unwrap();
        assert_eq!(after_fail.payment_status, BookingPaymentStatus::Failed);
        assert_eq!(after_fail.status, BookingStatus::Pending);

        let (paid, after_pay) = store
            .settle_payment(settlement(&booking, PaymentStatus::Success))
            .await
            .unwrap();
        assert_eq!(paid.id, failed.id);
        assert_eq!(after_pay.status, BookingStatus::Confirmed);
        assert_eq!(after_pay.payment_id, Some(paid.id));

        let err = store
            .settle_payment(settlement(&booking, PaymentStatus::Success))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reschedule_moves_payment_to_replacement() {
        let store = MemoryStore::new();
        let (.., booking) = seed_booking(&store).await;
        let (payment, paid) = store
            .settle_payment(settlement(&booking, PaymentStatus::Success))
            .await
            .unwrap();

        let replacement = NewBooking {
            customer_id: paid.customer_id,
            lawyer_id: paid.lawyer_id,
            service_id: paid.service_id,
            booking_date: NaiveDate::from_ymd_opt(2030, 1, 9).unwrap(),
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            total_amount: paid.total_amount,
            payment_status: paid.payment_status,
            payment_id: paid.payment_id,
            payment_method: paid.payment_method,
            notes: None,
            customer_notes: None,
            lawyer_notes: None,
            original_booking_id: Some(paid.id),
        };
        let (original, created) = store
            .reschedule_booking(paid.id, CancelledBy::Customer, replacement)
            .await
            .unwrap();
        assert_eq!(original.status, BookingStatus::Cancelled);

        let moved = store.find_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(moved.booking_id, created.id);
        assert!(store.find_payment_by_booking(original.id).await.unwrap().is_none());
        assert_eq!(
            store.find_payment_by_booking(created.id).await.unwrap().map(|p| p.id),
            Some(payment.id)
        );
    }

    #[tokio::test]
    async fn test_review_lifecycle_recomputes_ratings() {
        let store = MemoryStore::new();
        let (customer, lawyer, service, booking) = seed_booking(&store).await;

        let review = store
            .create_review(NewReview {
                user_id: customer.id,
                booking_id: booking.id,
                lawyer_id: Some(lawyer.id),
                service_id: Some(service.id),
                rating: 4,
                comment: None,
            })
            .await
            .unwrap();

        let rated = store.find_service(service.id).await.unwrap().unwrap();
        assert_eq!((rated.rating, rated.number_of_ratings), (4.0, 1));
        assert!(store.find_booking(booking.id).await.unwrap().unwrap().is_reviewed);

        store
            .update_review(review.id, ReviewUpdate { rating: Some(2), comment: None })
            .await
            .unwrap();
        let rated = store.find_lawyer(lawyer.id).await.unwrap().unwrap();
        assert_eq!((rated.rating, rated.number_of_ratings), (2.0, 1));

        store.delete_review(review.id).await.unwrap();
        let rated = store.find_service(service.id).await.unwrap().unwrap();
        assert_eq!((rated.rating, rated.number_of_ratings), (0.0, 0));
        assert!(!store.find_booking(booking.id).await.unwrap().unwrap().is_reviewed);
    }

    #[tokio::test]
    async fn test_cart_line_is_unique_per_service_and_lawyer() {
        let store = MemoryStore::new();
        let (customer, lawyer, service, _) = seed_booking(&store).await;

        let line = |quantity| NewCartItem {
            user_id: customer.id,
            service_id: service.id,
            lawyer_id: Some(lawyer.id),
            quantity,
            preferred_date: None,
            preferred_time_slot: None,
            notes: None,
        };
        let first = store.upsert_cart_item(line(1)).await.unwrap();
        let second = store.upsert_cart_item(line(3)).await.unwrap();

        assert_eq!(first.id, second.id);
        let cart = store.list_cart(customer.id).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 3);
    }

    #[test]
    fn test_paginate_window() {
        let page = paginate((1..=25).collect::<Vec<_>>(), PageRequest::new(Some(3), Some(10)));
        assert_eq!(page.total, 25);
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
    }
}
