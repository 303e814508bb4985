//! Booking lifecycle: creation, cart checkout, status transitions and
//! rescheduling.

use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use pocketlegal_auth::Claims;
use pocketlegal_common::{
    AppError, BookingPaymentStatus, BookingStatus, CancelledBy, Page, PageRequest, UserRole,
};
use pocketlegal_database::{
    Booking, BookingFilter, BookingStore, CartStore, CatalogStore, LawyerStore, NewBooking,
    NoteField, StatusChange, Store,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::cart::{parse_time_slot, resolve_line, PricedLine};
use super::{BookingEvent, NotificationDispatcher, NotificationEvent};
use crate::models::*;

const CHECKOUT_LEAD_DAYS: i64 = 7;

fn default_slot() -> (NaiveTime, NaiveTime) {
    (
        NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
    )
}

fn check_times(start: NaiveTime, end: NaiveTime) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::Validation(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

fn note_field(actor: CancelledBy) -> NoteField {
    match actor {
        CancelledBy::Customer => NoteField::Customer,
        CancelledBy::Lawyer => NoteField::Lawyer,
        CancelledBy::Admin => NoteField::General,
    }
}

/// Role-level permission for `actor` to request `next`. The transition
/// table is checked separately.
fn check_permission(actor: CancelledBy, next: BookingStatus) -> Result<(), AppError> {
    match actor {
        CancelledBy::Admin => Ok(()),
        CancelledBy::Customer if next == BookingStatus::Cancelled => Ok(()),
        CancelledBy::Customer => Err(AppError::Authorization(
            "Customers can only cancel bookings".to_string(),
        )),
        CancelledBy::Lawyer
            if matches!(
                next,
                BookingStatus::Confirmed | BookingStatus::Completed | BookingStatus::Rejected
            ) =>
        {
            Ok(())
        }
        CancelledBy::Lawyer => Err(AppError::Authorization(
            "Lawyers can only confirm, complete or reject bookings".to_string(),
        )),
    }
}

pub struct BookingService {
    store: Arc<dyn Store>,
    notifier: NotificationDispatcher,
}

impl BookingService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
            notifier: state.notifier.clone(),
        }
    }

    pub async fn create_booking(
        &self,
        claims: &Claims,
        request: CreateBookingRequest,
    ) -> Result<Booking, AppError> {
        check_times(request.start_time, request.end_time)?;

        let service = self
            .store
            .find_service(request.service_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;
        let lawyer = self
            .store
            .find_lawyer(request.lawyer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lawyer not found".to_string()))?;
        if !service.is_offered_by(lawyer.id) {
            return Err(AppError::Validation(
                "This lawyer does not offer the selected service".to_string(),
            ));
        }

        let booking = self
            .store
            .create_booking(NewBooking {
                customer_id: claims.user_id()?,
                lawyer_id: lawyer.id,
                service_id: service.id,
                booking_date: request.booking_date,
                start_time: request.start_time,
                end_time: request.end_time,
                total_amount: PricedLine::unit_price(&service, Some(&lawyer)),
                payment_status: BookingPaymentStatus::Pending,
                payment_id: None,
                payment_method: None,
                notes: request.notes,
                customer_notes: None,
                lawyer_notes: None,
                original_booking_id: None,
            })
            .await?;

        tracing::info!(booking_id = %booking.id, amount = %booking.total_amount, "Booking created");
        self.notify(&booking, BookingEvent::Created);
        Ok(booking)
    }

    /// Turns every cart line into a pending booking. All lines are resolved
    /// before anything is written.
    pub async fn checkout(
        &self,
        claims: &Claims,
        request: CheckoutRequest,
    ) -> Result<CheckoutPayload, AppError> {
        let customer_id = claims.user_id()?;
        let items = self.store.list_cart(customer_id).await?;
        if items.is_empty() {
            return Err(AppError::Validation("Your cart is empty".to_string()));
        }

        let default_date = Utc::now().date_naive() + Duration::days(CHECKOUT_LEAD_DAYS);
        let mut pending = Vec::with_capacity(items.len());
        for item in items {
            let line = resolve_line(self.store.as_ref(), item).await?;
            let lawyer = line.lawyer.as_ref().ok_or_else(|| {
                AppError::Validation(format!(
                    "No lawyer available for service {}",
                    line.service.name
                ))
            })?;
            let (start_time, end_time) = line
                .item
                .preferred_time_slot
                .as_deref()
                .and_then(parse_time_slot)
                .unwrap_or_else(default_slot);

            pending.push(NewBooking {
                customer_id,
                lawyer_id: lawyer.id,
                service_id: line.service.id,
                booking_date: line.item.preferred_date.unwrap_or(default_date),
                start_time,
                end_time,
                total_amount: line.line_total,
                payment_status: BookingPaymentStatus::Pending,
                payment_id: None,
                payment_method: request.payment_method,
                notes: line.item.notes.clone().or_else(|| request.notes.clone()),
                customer_notes: None,
                lawyer_notes: None,
                original_booking_id: None,
            });
        }

        let bookings = self.store.checkout(customer_id, pending).await?;
        let total_amount: Decimal = bookings.iter().map(|b| b.total_amount).sum();

        tracing::info!(
            customer_id = %customer_id,
            bookings = bookings.len(),
            total = %total_amount,
            "Cart checked out"
        );
        for booking in &bookings {
            self.notify(booking, BookingEvent::Created);
        }

        Ok(CheckoutPayload {
            total_amount,
            booking_count: bookings.len(),
            bookings,
        })
    }

    pub async fn list_customer_bookings(
        &self,
        claims: &Claims,
        query: BookingQuery,
    ) -> Result<(Page<Booking>, PageRequest), AppError> {
        let filter = BookingFilter {
            customer_id: Some(claims.user_id()?),
            ..filter_from(&query)
        };
        let page = PageRequest::new(query.page, query.limit);
        Ok((self.store.list_bookings(filter, page).await?, page))
    }

    pub async fn list_lawyer_bookings(
        &self,
        claims: &Claims,
        query: BookingQuery,
    ) -> Result<(Page<Booking>, PageRequest), AppError> {
        let lawyer = self
            .store
            .find_lawyer_by_user(claims.user_id()?)
            .await?
            .ok_or_else(|| {
                AppError::Authorization("Only lawyers can view assigned bookings".to_string())
            })?;

        let filter = BookingFilter {
            lawyer_id: Some(lawyer.id),
            ..filter_from(&query)
        };
        let page = PageRequest::new(query.page, query.limit);
        Ok((self.store.list_bookings(filter, page).await?, page))
    }

    pub async fn get_booking(&self, claims: &Claims, id: Uuid) -> Result<Booking, AppError> {
        let booking = self.find(id).await?;
        self.actor(claims, &booking).await?;
        Ok(booking)
    }

    pub async fn update_status(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<Booking, AppError> {
        let booking = self.find(id).await?;
        let actor = self.actor(claims, &booking).await?;
        let next = request.status;

        check_permission(actor, next)?;
        if !booking.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "Cannot change booking status from {} to {}",
                booking.status, next
            )));
        }

        let changed = next != booking.status;
        let closing = changed && matches!(next, BookingStatus::Cancelled | BookingStatus::Rejected);
        let change = StatusChange {
            expected: booking.status,
            status: next,
            cancelled_by: closing.then_some(actor),
            cancellation_reason: if closing {
                request.cancellation_reason
            } else {
                None
            },
            note: request.notes.map(|note| (note_field(actor), note)),
        };
        let updated = self.store.update_booking_status(id, change).await?;

        if changed {
            tracing::info!(
                booking_id = %id,
                from = %booking.status,
                to = %next,
                by = %actor,
                "Booking status changed"
            );
            if let Some(event) = BookingEvent::for_status(next) {
                self.notify(&updated, event);
            }
        }
        Ok(updated)
    }

    /// Cancels the booking with reason "Rescheduled" and books the same
    /// service, lawyer and price at the new time. Returns
    /// `(replacement, original)`.
    pub async fn reschedule(
        &self,
        claims: &Claims,
        id: Uuid,
        request: RescheduleRequest,
    ) -> Result<(Booking, Booking), AppError> {
        check_times(request.start_time, request.end_time)?;

        let booking = self.find(id).await?;
        let actor = self.actor(claims, &booking).await?;
        if booking.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Cannot reschedule a {} booking",
                booking.status
            )));
        }

        let replacement = NewBooking {
            customer_id: booking.customer_id,
            lawyer_id: booking.lawyer_id,
            service_id: booking.service_id,
            booking_date: request.booking_date,
            start_time: request.start_time,
            end_time: request.end_time,
            total_amount: booking.total_amount,
            payment_status: booking.payment_status,
            payment_id: booking.payment_id,
            payment_method: booking.payment_method,
            notes: request.notes.or_else(|| booking.notes.clone()),
            customer_notes: booking.customer_notes.clone(),
            lawyer_notes: booking.lawyer_notes.clone(),
            original_booking_id: Some(booking.id),
        };
        let (original, created) = self.store.reschedule_booking(id, actor, replacement).await?;

        tracing::info!(original_id = %original.id, booking_id = %created.id, "Booking rescheduled");
        self.notify(&created, BookingEvent::Rescheduled);
        Ok((created, original))
    }

    async fn find(&self, id: Uuid) -> Result<Booking, AppError> {
        self.store
            .find_booking(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    /// Which party of `booking` the caller acts as.
    async fn actor(&self, claims: &Claims, booking: &Booking) -> Result<CancelledBy, AppError> {
        if claims.is_admin() {
            return Ok(CancelledBy::Admin);
        }
        let user_id = claims.user_id()?;
        if booking.customer_id == user_id {
            return Ok(CancelledBy::Customer);
        }
        if claims.role == UserRole::Lawyer {
            let lawyer = self.store.find_lawyer_by_user(user_id).await?;
            if lawyer.is_some_and(|l| l.id == booking.lawyer_id) {
                return Ok(CancelledBy::Lawyer);
            }
        }
        Err(AppError::Authorization(
            "Not authorized to access this booking".to_string(),
        ))
    }

    fn notify(&self, booking: &Booking, event: BookingEvent) {
        self.notifier.dispatch(NotificationEvent::Booking {
            booking: booking.clone(),
            event,
        });
    }
}

fn filter_from(query: &BookingQuery) -> BookingFilter {
    BookingFilter {
        status: query.status,
        from_date: query.start_date,
        to_date: query.end_date,
        ..Default::default()
    }
}
