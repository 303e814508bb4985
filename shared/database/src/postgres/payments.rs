use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pocketlegal_common::{AppError, BookingPaymentStatus, Page, PageRequest, PaymentStatus};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::bookings::{BookingRow, BOOKING_COLUMNS};
use super::{into_page, PgStore};
use crate::models::*;
use crate::store::PaymentStore;

const PAYMENT_COLUMNS: &str = "id, booking_id, customer_id, lawyer_id, amount, currency, \
                               payment_method, status, transaction_id, refunded_amount, \
                               refund_reason, refunded_at, created_at, updated_at";

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    customer_id: Uuid,
    lawyer_id: Uuid,
    amount: Decimal,
    currency: String,
    payment_method: String,
    status: String,
    transaction_id: Option<String>,
    refunded_amount: Decimal,
    refund_reason: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            customer_id: row.customer_id,
            lawyer_id: row.lawyer_id,
            amount: row.amount,
            currency: row.currency,
            payment_method: row.payment_method.parse()?,
            status: row.status.parse()?,
            transaction_id: row.transaction_id,
            refunded_amount: row.refunded_amount,
            refund_reason: row.refund_reason,
            refunded_at: row.refunded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_payment_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(lawyer_id) = filter.lawyer_id {
        qb.push(" AND lawyer_id = ").push_bind(lawyer_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>, AppError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn settle_payment(
        &self,
        settlement: PaymentSettlement,
    ) -> Result<(Payment, Booking), AppError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(settlement.booking_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Booking not found".to_string()));
        }

        // Only a pending or failed attempt may be overwritten.
        let payment: Option<PaymentRow> = sqlx::query_as(&format!(
            "INSERT INTO payments \
                (id, booking_id, customer_id, lawyer_id, amount, currency, payment_method, status, transaction_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (booking_id) DO UPDATE SET \
                amount = EXCLUDED.amount, \
                currency = EXCLUDED.currency, \
                payment_method = EXCLUDED.payment_method, \
                status = EXCLUDED.status, \
                transaction_id = EXCLUDED.transaction_id, \
                updated_at = NOW() \
             WHERE payments.status IN ('pending', 'failed') \
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(settlement.booking_id)
        .bind(settlement.customer_id)
        .bind(settlement.lawyer_id)
        .bind(settlement.amount)
        .bind(&settlement.currency)
        .bind(settlement.payment_method.as_str())
        .bind(settlement.status.as_str())
        .bind(&settlement.transaction_id)
        .fetch_optional(&mut *tx)
        .await?;

        let payment: Payment = payment
            .ok_or_else(|| {
                AppError::Conflict("Payment already processed for this booking".to_string())
            })?
            .try_into()?;

        let booking: BookingRow = sqlx::query_as(&format!(
            "UPDATE bookings SET \
                payment_status = $2, \
                payment_id = $3, \
                payment_method = $4, \
                status = CASE WHEN $5 AND status = 'pending' THEN 'confirmed' ELSE status END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(settlement.booking_id)
        .bind(BookingPaymentStatus::from(payment.status).as_str())
        .bind(payment.id)
        .bind(payment.payment_method.as_str())
        .bind(payment.status == PaymentStatus::Success)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((payment, booking.try_into()?))
    }

    async fn refund_payment(&self, refund: RefundRecord) -> Result<(Payment, Booking), AppError> {
        let mut tx = self.pool.begin().await?;

        let payment: Option<PaymentRow> = sqlx::query_as(&format!(
            "UPDATE payments SET \
                status = $2, \
                refunded_amount = $3, \
                refund_reason = $4, \
                refunded_at = NOW(), \
                updated_at = NOW() \
             WHERE id = $1 AND status = 'success' RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(refund.payment_id)
        .bind(refund.status.as_str())
        .bind(refund.amount)
        .bind(&refund.reason)
        .fetch_optional(&mut *tx)
        .await?;

        let payment: Payment = match payment {
            Some(row) => row.try_into()?,
            None => {
                drop(tx);
                return match self.find_payment(refund.payment_id).await? {
                    Some(current) => Err(AppError::Conflict(format!(
                        "Payment cannot be refunded in status {}",
                        current.status
                    ))),
                    None => Err(AppError::NotFound("Payment not found".to_string())),
                };
            }
        };

        let booking: BookingRow = sqlx::query_as(&format!(
            "UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(payment.booking_id)
        .bind(BookingPaymentStatus::from(payment.status).as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((payment, booking.try_into()?))
    }

    async fn list_payments(
        &self,
        filter: PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM payments");
        push_payment_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM payments", PAYMENT_COLUMNS));
        push_payment_filters(&mut query, &filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<PaymentRow> = query.build_query_as().fetch_all(&self.pool).await?;

        into_page(rows, total)
    }
}
