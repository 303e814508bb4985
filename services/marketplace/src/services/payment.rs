use std::sync::Arc;

use pocketlegal_auth::Claims;
use pocketlegal_common::{
    AppError, BookingPaymentStatus, BookingStatus, Page, PageRequest, PaymentStatus,
};
use pocketlegal_database::{
    Booking, BookingStore, LawyerStore, Payment, PaymentFilter, PaymentSettlement, PaymentStore,
    RefundRecord, Store,
};
use uuid::Uuid;

use super::{
    ChargeOutcome, ChargeRequest, NotificationDispatcher, NotificationEvent, PaymentEvent,
    PaymentGateway,
};
use crate::models::*;

pub struct PaymentService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: NotificationDispatcher,
    currency: String,
}

impl PaymentService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
            gateway: state.gateway.clone(),
            notifier: state.notifier.clone(),
            currency: state.config.payment.default_currency.clone(),
        }
    }

    /// Charges the caller for one of their bookings.
    ///
    /// A declined charge is still recorded as a `failed` payment before the
    /// `Payment` error is returned, so the customer can retry.
    pub async fn process_payment(
        &self,
        claims: &Claims,
        request: ProcessPaymentRequest,
    ) -> Result<(Payment, Booking), AppError> {
        let booking = self
            .store
            .find_booking(request.booking_id)
            .await?
            .filter(|b| claims.user_id().is_ok_and(|id| id == b.customer_id))
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if matches!(booking.status, BookingStatus::Cancelled | BookingStatus::Rejected) {
            return Err(AppError::Conflict(format!(
                "Cannot pay for a {} booking",
                booking.status
            )));
        }
        if booking.payment_status == BookingPaymentStatus::Completed {
            return Err(already_processed());
        }
        let mut existing = self.store.find_payment_by_booking(booking.id).await?;
        if let (None, Some(payment_id)) = (&existing, booking.payment_id) {
            existing = self.store.find_payment(payment_id).await?;
        }
        if let Some(existing) = existing {
            if !matches!(existing.status, PaymentStatus::Pending | PaymentStatus::Failed) {
                return Err(already_processed());
            }
        }

        let outcome = self
            .gateway
            .charge(&ChargeRequest {
                booking_id: booking.id,
                amount: booking.total_amount,
                currency: &self.currency,
                method: request.payment_method,
            })
            .await?;

        let (status, transaction_id, decline) = match outcome {
            ChargeOutcome::Approved { transaction_id } => (PaymentStatus::Success, transaction_id, None),
            ChargeOutcome::Declined {
                transaction_id,
                reason,
            } => (PaymentStatus::Failed, transaction_id, Some(reason)),
        };

        let (payment, booking) = self
            .store
            .settle_payment(PaymentSettlement {
                booking_id: booking.id,
                customer_id: booking.customer_id,
                lawyer_id: booking.lawyer_id,
                amount: booking.total_amount,
                currency: self.currency.clone(),
                payment_method: request.payment_method,
                status,
                transaction_id: Some(transaction_id),
            })
            .await?;

        if let Some(reason) = decline {
            tracing::warn!(
                booking_id = %booking.id,
                gateway = self.gateway.name(),
                "Payment declined: {}",
                reason
            );
            return Err(AppError::Payment(format!("Payment failed: {}", reason)));
        }

        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking.id,
            amount = %payment.amount,
            gateway = self.gateway.name(),
            "Payment processed"
        );
        self.notify(&payment, PaymentEvent::Success);
        Ok((payment, booking))
    }

    /// Refunds all or part of a successful payment. Only an admin or the
    /// lawyer who received the payment may do this.
    pub async fn refund(
        &self,
        claims: &Claims,
        request: RefundRequest,
    ) -> Result<(Payment, Booking), AppError> {
        let payment = self.find(request.payment_id).await?;
        if !claims.is_admin() && !self.is_payee(claims, &payment).await? {
            return Err(AppError::Authorization(
                "Not authorized to refund this payment".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Success {
            return Err(AppError::Conflict(format!(
                "Payment cannot be refunded in status {}",
                payment.status
            )));
        }

        let amount = request.amount.unwrap_or(payment.amount);
        if amount > payment.amount {
            return Err(AppError::Validation(
                "Refund amount cannot exceed the original payment amount".to_string(),
            ));
        }

        self.gateway
            .refund(payment.transaction_id.as_deref(), amount)
            .await?;

        let status = if amount == payment.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartialRefund
        };
        let (payment, booking) = self
            .store
            .refund_payment(RefundRecord {
                payment_id: payment.id,
                amount,
                status,
                reason: request.reason,
            })
            .await?;

        tracing::info!(payment_id = %payment.id, %amount, status = %payment.status, "Payment refunded");
        self.notify(&payment, PaymentEvent::Refunded);
        Ok((payment, booking))
    }

    pub async fn get_payment(&self, claims: &Claims, id: Uuid) -> Result<PaymentPayload, AppError> {
        let payment = self.find(id).await?;
        let is_customer = claims.user_id()? == payment.customer_id;
        if !is_customer && !claims.is_admin() && !self.is_payee(claims, &payment).await? {
            return Err(AppError::Authorization(
                "Not authorized to access this payment".to_string(),
            ));
        }

        let booking = self.store.find_booking(payment.booking_id).await?;
        Ok(PaymentPayload { payment, booking })
    }

    pub async fn list_customer_payments(
        &self,
        claims: &Claims,
        query: PaymentQuery,
    ) -> Result<(Page<Payment>, PageRequest), AppError> {
        let filter = PaymentFilter {
            customer_id: Some(claims.user_id()?),
            status: query.status,
            ..Default::default()
        };
        let page = PageRequest::new(query.page, query.limit);
        Ok((self.store.list_payments(filter, page).await?, page))
    }

    pub async fn list_lawyer_payments(
        &self,
        claims: &Claims,
        query: PaymentQuery,
    ) -> Result<(Page<Payment>, PageRequest), AppError> {
        let lawyer = self
            .store
            .find_lawyer_by_user(claims.user_id()?)
            .await?
            .ok_or_else(|| {
                AppError::Authorization("Only lawyers can view received payments".to_string())
            })?;

        let filter = PaymentFilter {
            lawyer_id: Some(lawyer.id),
            status: query.status,
            ..Default::default()
        };
        let page = PageRequest::new(query.page, query.limit);
        Ok((self.store.list_payments(filter, page).await?, page))
    }

    async fn find(&self, id: Uuid) -> Result<Payment, AppError> {
        self.store
            .find_payment(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    async fn is_payee(&self, claims: &Claims, payment: &Payment) -> Result<bool, AppError> {
        let lawyer = self.store.find_lawyer_by_user(claims.user_id()?).await?;
        Ok(lawyer.is_some_and(|l| l.id == payment.lawyer_id))
    }

    fn notify(&self, payment: &Payment, event: PaymentEvent) {
        self.notifier.dispatch(NotificationEvent::Payment {
            payment: payment.clone(),
            event,
        });
    }
}

fn already_processed() -> AppError {
    AppError::Conflict("Payment already processed for this booking".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::Fixture;
    use crate::services::{AppState, BookingService, SimulatedGateway};
    use chrono::{NaiveDate, NaiveTime};
    use pocketlegal_common::PaymentMethod;
    use rust_decimal::Decimal;

    async fn booking(fx: &Fixture) -> Booking {
        BookingService::new(&fx.state)
            .create_booking(
                &fx.customer,
                CreateBookingRequest {
                    service_id: fx.service.id,
                    lawyer_id: fx.lawyer_profile.id,
                    booking_date: NaiveDate::from_ymd_opt(2030, 1, 2).unwrap(),
                    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    notes: None,
                },
            )
            .await
            .unwrap()
    }

    fn pay(booking: &Booking) -> ProcessPaymentRequest {
        ProcessPaymentRequest {
            booking_id: booking.id,
            payment_method: PaymentMethod::CreditCard,
        }
    }

    fn refund(payment: &Payment, amount: Option<i64>) -> RefundRequest {
        RefundRequest {
            payment_id: payment.id,
            amount: amount.map(|a| Decimal::new(a, 0)),
            reason: Some("Client request".into()),
        }
    }

    #[tokio::test]
    async fn test_payment_confirms_booking_and_rejects_second_attempt() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let payments = PaymentService::new(&fx.state);

        let (payment, paid) = payments.process_payment(&fx.customer, pay(&booking)).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.amount, Decimal::new(150, 0));
        assert!(payment.transaction_id.as_deref().unwrap().starts_with("DEMO_"));
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_status, BookingPaymentStatus::Completed);
        assert_eq!(paid.payment_id, Some(payment.id));

        let err = payments
            .process_payment(&fx.customer, pay(&booking))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_other_customers_cannot_pay() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let stranger = fx.stranger().await;

        let err = PaymentService::new(&fx.state)
            .process_payment(&stranger, pay(&booking))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_declined_charge_is_recorded_as_failed() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let state = AppState {
            gateway: Arc::new(SimulatedGateway::new(0.0)),
            ..fx.state.clone()
        };

        let err = PaymentService::new(&state)
            .process_payment(&fx.customer, pay(&booking))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));

        let failed = fx.store.find_payment_by_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        let booking_now = fx.store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking_now.payment_status, BookingPaymentStatus::Failed);
        assert_eq!(booking_now.status, BookingStatus::Pending);

        let (retried, _) = PaymentService::new(&fx.state)
            .process_payment(&fx.customer, pay(&booking))
            .await
            .unwrap();
        assert_eq!(retried.id, failed.id);
        assert_eq!(retried.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_refund_rules() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let payments = PaymentService::new(&fx.state);
        let (payment, _) = payments.process_payment(&fx.customer, pay(&booking)).await.unwrap();

        let err = payments.refund(&fx.customer, refund(&payment, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let err = payments
            .refund(&fx.lawyer, refund(&payment, Some(500)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (partial, booking_now) = payments
            .refund(&fx.lawyer, refund(&payment, Some(40)))
            .await
            .unwrap();
        assert_eq!(partial.status, PaymentStatus::PartialRefund);
        assert_eq!(partial.refunded_amount, Decimal::new(40, 0));
        assert_eq!(booking_now.payment_status, BookingPaymentStatus::PartialRefund);

        let err = payments.refund(&fx.admin, refund(&payment, None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_full_refund_by_admin() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let payments = PaymentService::new(&fx.state);
        let (payment, _) = payments.process_payment(&fx.customer, pay(&booking)).await.unwrap();

        let (refunded, booking_now) = payments.refund(&fx.admin, refund(&payment, None)).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert_eq!(booking_now.payment_status, BookingPaymentStatus::Refunded);

        let payload = payments.get_payment(&fx.customer, payment.id).await.unwrap();
        assert_eq!(payload.payment.status, PaymentStatus::Refunded);
        assert!(payload.booking.is_some());
    }

    fn move_to_march() -> RescheduleRequest {
        RescheduleRequest {
            booking_date: NaiveDate::from_ymd_opt(2030, 3, 4).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_refund_after_reschedule_updates_replacement() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let payments = PaymentService::new(&fx.state);
        let (payment, _) = payments.process_payment(&fx.customer, pay(&booking)).await.unwrap();

        let (replacement, original) = BookingService::new(&fx.state)
            .reschedule(&fx.customer, booking.id, move_to_march())
            .await
            .unwrap();
        assert_eq!(original.status, BookingStatus::Cancelled);
        assert_eq!(replacement.payment_id, Some(payment.id));

        let moved = fx.store.find_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(moved.booking_id, replacement.id);

        let (refunded, touched) = payments.refund(&fx.admin, refund(&payment, None)).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert_eq!(touched.id, replacement.id);

        let replacement_now = fx.store.find_booking(replacement.id).await.unwrap().unwrap();
        assert_eq!(replacement_now.payment_status, BookingPaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_rescheduled_booking_cannot_be_charged_again() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let payments = PaymentService::new(&fx.state);
        let (payment, _) = payments.process_payment(&fx.customer, pay(&booking)).await.unwrap();
        payments
            .refund(&fx.lawyer, refund(&payment, Some(40)))
            .await
            .unwrap();

        let (replacement, _) = BookingService::new(&fx.state)
            .reschedule(&fx.customer, booking.id, move_to_march())
            .await
            .unwrap();
        assert_eq!(replacement.payment_status, BookingPaymentStatus::PartialRefund);

        let err = payments
            .process_payment(&fx.customer, pay(&replacement))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let all = fx
            .store
            .list_payments(PaymentFilter::default(), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(all.total, 1);
    }

    #[tokio::test]
    async fn test_concurrent_payments_charge_once() {
        let fx = Fixture::new().await;
        let booking = booking(&fx).await;
        let payments = PaymentService::new(&fx.state);

        let (first, second) = tokio::join!(
            payments.process_payment(&fx.customer, pay(&booking)),
            payments.process_payment(&fx.customer, pay(&booking)),
        );
        let results = [first, second];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::Conflict(_))))
            .count();
        assert_eq!((succeeded, conflicts), (1, 1));

        let all = fx
            .store
            .list_payments(PaymentFilter::default(), PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(all.total, 1);
        assert_eq!(all.items[0].status, PaymentStatus::Success);
    }
}
