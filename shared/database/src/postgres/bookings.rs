use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pocketlegal_common::{AppError, CancelledBy, Page, PageRequest};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{into_page, parse_opt, PgStore};
use crate::models::*;
use crate::store::BookingStore;

pub(super) const BOOKING_COLUMNS: &str =
    "id, customer_id, lawyer_id, service_id, status, booking_date, start_time, end_time, \
     total_amount, payment_status, payment_id, payment_method, notes, customer_notes, \
     lawyer_notes, cancellation_reason, cancelled_by, cancelled_at, is_rescheduled, \
     original_booking_id, is_reviewed, created_at, updated_at";

#[derive(FromRow)]
pub(super) struct BookingRow {
    id: Uuid,
    customer_id: Uuid,
    lawyer_id: Uuid,
    service_id: Uuid,
    status: String,
    booking_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    total_amount: Decimal,
    payment_status: String,
    payment_id: Option<Uuid>,
    payment_method: Option<String>,
    notes: Option<String>,
    customer_notes: Option<String>,
    lawyer_notes: Option<String>,
    cancellation_reason: Option<String>,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    is_rescheduled: bool,
    original_booking_id: Option<Uuid>,
    is_reviewed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            customer_id: row.customer_id,
            lawyer_id: row.lawyer_id,
            service_id: row.service_id,
            status: row.status.parse()?,
            booking_date: row.booking_date,
            start_time: row.start_time,
            end_time: row.end_time,
            total_amount: row.total_amount,
            payment_status: row.payment_status.parse()?,
            payment_id: row.payment_id,
            payment_method: parse_opt(row.payment_method)?,
            notes: row.notes,
            customer_notes: row.customer_notes,
            lawyer_notes: row.lawyer_notes,
            cancellation_reason: row.cancellation_reason,
            cancelled_by: parse_opt(row.cancelled_by)?,
            cancelled_at: row.cancelled_at,
            is_rescheduled: row.is_rescheduled,
            original_booking_id: row.original_booking_id,
            is_reviewed: row.is_reviewed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn insert_booking(conn: &mut PgConnection, new: &NewBooking) -> Result<Booking, AppError> {
    let row: BookingRow = sqlx::query_as(&format!(
        "INSERT INTO bookings \
            (id, customer_id, lawyer_id, service_id, status, booking_date, start_time, end_time, \
             total_amount, payment_status, payment_id, payment_method, notes, customer_notes, \
             lawyer_notes, is_rescheduled, original_booking_id) \
         VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING {}",
        BOOKING_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(new.customer_id)
    .bind(new.lawyer_id)
    .bind(new.service_id)
    .bind(new.booking_date)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(new.total_amount)
    .bind(new.payment_status.as_str())
    .bind(new.payment_id)
    .bind(new.payment_method.map(|m| m.as_str()))
    .bind(&new.notes)
    .bind(&new.customer_notes)
    .bind(&new.lawyer_notes)
    .bind(new.original_booking_id.is_some())
    .bind(new.original_booking_id)
    .fetch_one(conn)
    .await?;
    row.try_into()
}

pub(super) async fn fetch_booking(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<Booking>, AppError> {
    let row: Option<BookingRow> =
        sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Booking::try_from).transpose()
}

fn push_booking_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
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
    if let Some(from) = filter.from_date {
        qb.push(" AND booking_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND booking_date <= ").push_bind(to);
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_booking(&mut conn, &new).await
    }

    async fn checkout(
        &self,
        customer_id: Uuid,
        bookings: Vec<NewBooking>,
    ) -> Result<Vec<Booking>, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut created = Vec::with_capacity(bookings.len());
        for new in &bookings {
            created.push(insert_booking(&mut tx, new).await?);
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_booking(&mut conn, id).await
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Booking, AppError> {
        let (customer_note, lawyer_note, general_note) = match change.note {
            Some((NoteField::Customer, note)) => (Some(note), None, None),
            Some((NoteField::Lawyer, note)) => (None, Some(note), None),
            Some((NoteField::General, note)) => (None, None, Some(note)),
            None => (None, None, None),
        };
        let cancelled_at = change.cancelled_by.map(|_| Utc::now());

        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET \
                status = $3, \
                cancelled_by = COALESCE($4, cancelled_by), \
                cancellation_reason = COALESCE($5, cancellation_reason), \
                cancelled_at = COALESCE($6, cancelled_at), \
                customer_notes = COALESCE($7, customer_notes), \
                lawyer_notes = COALESCE($8, lawyer_notes), \
                notes = COALESCE($9, notes), \
                updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(change.expected.as_str())
        .bind(change.status.as_str())
        .bind(change.cancelled_by.map(|c| c.as_str()))
        .bind(change.cancellation_reason)
        .bind(cancelled_at)
        .bind(customer_note)
        .bind(lawyer_note)
        .bind(general_note)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.find_booking(id).await? {
                Some(current) => Err(AppError::Conflict(format!(
                    "Booking is now {}, status was changed concurrently",
                    current.status
                ))),
                None => Err(AppError::NotFound("Booking not found".to_string())),
            },
        }
    }

    async fn reschedule_booking(
        &self,
        original_id: Uuid,
        cancelled_by: CancelledBy,
        replacement: NewBooking,
    ) -> Result<(Booking, Booking), AppError> {
        let mut tx = self.pool.begin().await?;

        let original: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET \
                status = 'cancelled', \
                cancellation_reason = 'Rescheduled', \
                cancelled_by = $2, \
                cancelled_at = NOW(), \
                updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'confirmed') RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(original_id)
        .bind(cancelled_by.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let original: Booking = match original {
            Some(row) => row.try_into()?,
            None => {
                return match fetch_booking(&mut tx, original_id).await? {
                    Some(current) => Err(AppError::Conflict(format!(
                        "Cannot reschedule a {} booking",
                        current.status
                    ))),
                    None => Err(AppError::NotFound("Booking not found".to_string())),
                };
            }
        };

        let created = insert_booking(&mut tx, &replacement).await?;
        // The payment follows the live booking so refunds and repeat
        // charges resolve against the replacement.
        if let Some(payment_id) = created.payment_id {
            sqlx::query("UPDATE payments SET booking_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(payment_id)
                .bind(created.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok((original, created))
    }

    async fn list_bookings(
        &self,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<Page<Booking>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_booking_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM bookings", BOOKING_COLUMNS));
        push_booking_filters(&mut query, &filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<BookingRow> = query.build_query_as().fetch_all(&self.pool).await?;

        into_page(rows, total)
    }
}
