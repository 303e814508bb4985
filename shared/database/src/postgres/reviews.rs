use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pocketlegal_common::{AppError, Page, PageRequest};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{into_page, PgStore};
use crate::models::*;
use crate::store::ReviewStore;

const REVIEW_COLUMNS: &str = "id, user_id, booking_id, lawyer_id, service_id, rating, comment, \
                              is_published, created_at, updated_at";

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    booking_id: Uuid,
    lawyer_id: Option<Uuid>,
    service_id: Option<Uuid>,
    rating: i32,
    comment: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: row.id,
            user_id: row.user_id,
            booking_id: row.booking_id,
            lawyer_id: row.lawyer_id,
            service_id: row.service_id,
            rating: row.rating,
            comment: row.comment,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row-locks the rated service and lawyer so concurrent review writes
/// serialise their aggregate recomputation. Service first, then lawyer.
async fn lock_targets(
    conn: &mut PgConnection,
    service_id: Option<Uuid>,
    lawyer_id: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(service_id) = service_id {
        sqlx::query("SELECT 1 FROM services WHERE id = $1 FOR UPDATE")
            .bind(service_id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(lawyer_id) = lawyer_id {
        sqlx::query("SELECT 1 FROM lawyers WHERE id = $1 FOR UPDATE")
            .bind(lawyer_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Full rescan: rating is the mean of every review on the target.
async fn recompute_ratings(
    conn: &mut PgConnection,
    service_id: Option<Uuid>,
    lawyer_id: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(service_id) = service_id {
        sqlx::query(
            "UPDATE services SET rating = agg.mean, number_of_ratings = agg.total, updated_at = NOW() \
             FROM (SELECT COALESCE(AVG(rating)::float8, 0) AS mean, COUNT(*)::int AS total \
                   FROM reviews WHERE service_id = $1) AS agg \
             WHERE services.id = $1",
        )
        .bind(service_id)
        .execute(&mut *conn)
        .await?;
    }
    if let Some(lawyer_id) = lawyer_id {
        sqlx::query(
            "UPDATE lawyers SET rating = agg.mean, number_of_ratings = agg.total, updated_at = NOW() \
             FROM (SELECT COALESCE(AVG(rating)::float8, 0) AS mean, COUNT(*)::int AS total \
                   FROM reviews WHERE lawyer_id = $1) AS agg \
             WHERE lawyers.id = $1",
        )
        .bind(lawyer_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn push_review_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReviewFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(lawyer_id) = filter.lawyer_id {
        qb.push(" AND lawyer_id = ").push_bind(lawyer_id);
    }
    if let Some(service_id) = filter.service_id {
        qb.push(" AND service_id = ").push_bind(service_id);
    }
    if filter.published_only {
        qb.push(" AND is_published = TRUE");
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn create_review(&self, new: NewReview) -> Result<Review, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_targets(&mut tx, new.service_id, new.lawyer_id).await?;

        let row: ReviewRow = sqlx::query_as(&format!(
            "INSERT INTO reviews (id, user_id, booking_id, lawyer_id, service_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.booking_id)
        .bind(new.lawyer_id)
        .bind(new.service_id)
        .bind(new.rating)
        .bind(&new.comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("You have already reviewed this booking".to_string())
            }
            other => other,
        })?;

        sqlx::query("UPDATE bookings SET is_reviewed = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(new.booking_id)
            .execute(&mut *tx)
            .await?;

        recompute_ratings(&mut tx, new.service_id, new.lawyer_id).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>, AppError> {
        let row: Option<ReviewRow> =
            sqlx::query_as(&format!("SELECT {} FROM reviews WHERE id = $1", REVIEW_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Review::try_from).transpose()
    }

    async fn update_review(&self, id: Uuid, update: ReviewUpdate) -> Result<Review, AppError> {
        let existing = self
            .find_review(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        let mut tx = self.pool.begin().await?;
        lock_targets(&mut tx, existing.service_id, existing.lawyer_id).await?;

        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "UPDATE reviews SET \
                rating = COALESCE($2, rating), \
                comment = COALESCE($3, comment), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .bind(update.rating)
        .bind(update.comment)
        .fetch_optional(&mut *tx)
        .await?;
        let row = row.ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        recompute_ratings(&mut tx, existing.service_id, existing.lawyer_id).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, AppError> {
        let Some(existing) = self.find_review(id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        lock_targets(&mut tx, existing.service_id, existing.lawyer_id).await?;

        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "DELETE FROM reviews WHERE id = $1 RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE bookings SET is_reviewed = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(existing.booking_id)
            .execute(&mut *tx)
            .await?;

        recompute_ratings(&mut tx, existing.service_id, existing.lawyer_id).await?;
        tx.commit().await?;
        row.try_into().map(Some)
    }

    async fn list_reviews(
        &self,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> Result<Page<Review>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM reviews");
        push_review_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM reviews", REVIEW_COLUMNS));
        push_review_filters(&mut query, &filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<ReviewRow> = query.build_query_as().fetch_all(&self.pool).await?;

        into_page(rows, total)
    }
}
