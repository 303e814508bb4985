use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pocketlegal_common::{AppError, Page, PageRequest};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{into_page, parse_opt, PgStore};
use crate::models::*;
use crate::store::NotificationStore;

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, notification_type, related_id, \
                                    related_model, is_read, read_at, action_url, priority, created_at";

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    notification_type: String,
    related_id: Option<Uuid>,
    related_model: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    action_url: Option<String>,
    priority: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            notification_type: row.notification_type.parse()?,
            related_id: row.related_id,
            related_model: parse_opt(row.related_model)?,
            is_read: row.is_read,
            read_at: row.read_at,
            action_url: row.action_url,
            priority: row.priority.parse()?,
            created_at: row.created_at,
        })
    }
}

fn push_notification_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Uuid,
    filter: &NotificationFilter,
) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(is_read) = filter.is_read {
        qb.push(" AND is_read = ").push_bind(is_read);
    }
    if let Some(kind) = filter.notification_type {
        qb.push(" AND notification_type = ").push_bind(kind.as_str());
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority.as_str());
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_notification(&self, new: NewNotification) -> Result<Notification, AppError> {
        let row: NotificationRow = sqlx::query_as(&format!(
            "INSERT INTO notifications \
                (id, user_id, title, message, notification_type, related_id, related_model, action_url, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.notification_type.as_str())
        .bind(new.related_id)
        .bind(new.related_model.map(|m| m.as_str()))
        .bind(&new.action_url)
        .bind(new.priority.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_notification_filters(&mut count, user_id, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM notifications",
            NOTIFICATION_COLUMNS
        ));
        push_notification_filters(&mut query, user_id, &filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<NotificationRow> = query.build_query_as().fetch_all(&self.pool).await?;

        into_page(rows, total)
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Notification>, AppError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_notifications(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
