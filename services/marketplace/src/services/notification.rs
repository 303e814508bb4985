use std::sync::Arc;

use pocketlegal_auth::Claims;
use pocketlegal_common::{AppError, PageRequest};
use pocketlegal_database::{Notification, NotificationFilter, NotificationStore, Store};
use uuid::Uuid;

use crate::models::*;

/// The caller's notification inbox. Rows are written by the dispatcher.
pub struct NotificationService {
    store: Arc<dyn Store>,
}

impl NotificationService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn list(
        &self,
        claims: &Claims,
        query: NotificationQuery,
    ) -> Result<NotificationList, AppError> {
        let user_id = claims.user_id()?;
        let page = PageRequest::new(query.page, query.limit);
        let filter = NotificationFilter {
            is_read: query.is_read,
            notification_type: query.notification_type,
            priority: query.priority,
        };

        let result = self.store.list_notifications(user_id, filter, page).await?;
        let unread_count = self.store.count_unread(user_id).await?;
        Ok(NotificationList {
            meta: PageMeta::new(&result, page),
            unread_count,
            notifications: result.items,
        })
    }

    pub async fn mark_read(&self, claims: &Claims, id: Uuid) -> Result<Notification, AppError> {
        self.store
            .mark_notification_read(claims.user_id()?, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    pub async fn mark_all_read(&self, claims: &Claims) -> Result<u64, AppError> {
        self.store.mark_all_read(claims.user_id()?).await
    }

    pub async fn delete(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_notification(claims.user_id()?, id).await? {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub async fn clear(&self, claims: &Claims) -> Result<u64, AppError> {
        self.store.clear_notifications(claims.user_id()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::Fixture;
    use pocketlegal_common::{NotificationPriority, NotificationType};
    use pocketlegal_database::NewNotification;

    async fn seed(fx: &Fixture, title: &str) -> Notification {
        fx.store
            .create_notification(NewNotification {
                user_id: fx.customer.user_id().unwrap(),
                title: title.into(),
                message: "Hello".into(),
                notification_type: NotificationType::System,
                related_id: None,
                related_model: None,
                action_url: None,
                priority: NotificationPriority::Low,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_inbox_counts_and_marks_read() {
        let fx = Fixture::new().await;
        let inbox = NotificationService::new(&fx.state);
        let first = seed(&fx, "First").await;
        seed(&fx, "Second").await;

        let list = inbox.list(&fx.customer, NotificationQuery::default()).await.unwrap();
        assert_eq!(list.meta.total, 2);
        assert_eq!(list.unread_count, 2);

        let read = inbox.mark_read(&fx.customer, first.id).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());

        let unread = inbox
            .list(
                &fx.customer,
                NotificationQuery {
                    is_read: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unread.meta.total, 1);
        assert_eq!(unread.unread_count, 1);

        assert_eq!(inbox.mark_all_read(&fx.customer).await.unwrap(), 1);
        assert_eq!(inbox.clear(&fx.customer).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_other_users_rows_are_invisible() {
        let fx = Fixture::new().await;
        let inbox = NotificationService::new(&fx.state);
        let own = seed(&fx, "Private").await;

        let err = inbox.mark_read(&fx.lawyer, own.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = inbox.delete(&fx.lawyer, own.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        inbox.delete(&fx.customer, own.id).await.unwrap();
    }
}
