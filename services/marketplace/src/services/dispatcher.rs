//! Best-effort notification fan-out.
//!
//! Business operations hand an event to [`NotificationDispatcher::dispatch`],
//! which only enqueues it. A background worker renders the templates and
//! writes one notification row per recipient. Nothing here can fail or slow
//! down the operation that raised the event.

use std::sync::Arc;

use futures::future::join_all;
use pocketlegal_common::{
    AppError, BookingStatus, NotificationPriority, NotificationType, RelatedModel,
};
use pocketlegal_database::{
    Booking, CatalogStore, LawyerStore, NewNotification, NotificationStore, Payment, Review, Store,
};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Created,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
    Rescheduled,
}

impl BookingEvent {
    /// Event raised when a booking enters `status`.
    pub fn for_status(status: BookingStatus) -> Option<Self> {
        match status {
            BookingStatus::Pending => None,
            BookingStatus::Confirmed => Some(Self::Confirmed),
            BookingStatus::Completed => Some(Self::Completed),
            BookingStatus::Cancelled => Some(Self::Cancelled),
            BookingStatus::Rejected => Some(Self::Rejected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    Success,
    Refunded,
}

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Booking { booking: Booking, event: BookingEvent },
    Payment { payment: Payment, event: PaymentEvent },
    Review { review: Review },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recipient {
    Customer,
    Lawyer,
}

struct Template {
    title: &'static str,
    message: String,
    recipients: &'static [Recipient],
}

fn booking_template(event: BookingEvent, service_name: &str) -> Template {
    use Recipient::*;

    match event {
        BookingEvent::Created => Template {
            title: "New Booking Request",
            message: format!("You have received a new booking request for {}", service_name),
            recipients: &[Lawyer],
        },
        BookingEvent::Confirmed => Template {
            title: "Booking Confirmed",
            message: format!("Your booking for {} has been confirmed", service_name),
            recipients: &[Customer],
        },
        BookingEvent::Completed => Template {
            title: "Booking Completed",
            message: format!(
                "Your booking for {} has been marked as completed. Please leave a review!",
                service_name
            ),
            recipients: &[Customer],
        },
        BookingEvent::Cancelled => Template {
            title: "Booking Cancelled",
            message: format!("A booking for {} has been cancelled", service_name),
            recipients: &[Customer, Lawyer],
        },
        BookingEvent::Rejected => Template {
            title: "Booking Rejected",
            message: format!("Your booking request for {} was declined", service_name),
            recipients: &[Customer],
        },
        BookingEvent::Rescheduled => Template {
            title: "Booking Rescheduled",
            message: format!("A booking for {} has been rescheduled", service_name),
            recipients: &[Customer, Lawyer],
        },
    }
}

fn payment_template(event: PaymentEvent, booking_id: Uuid) -> Template {
    use Recipient::*;

    match event {
        PaymentEvent::Success => Template {
            title: "Payment Successful",
            message: format!(
                "Payment for booking #{} has been processed successfully",
                booking_id
            ),
            recipients: &[Customer, Lawyer],
        },
        PaymentEvent::Refunded => Template {
            title: "Payment Refunded",
            message: format!("Your payment for booking #{} has been refunded", booking_id),
            recipients: &[Customer],
        },
    }
}

/// Cheap to clone; every clone feeds the same worker.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationEvent>,
}

impl NotificationDispatcher {
    /// Creates the queue and spawns its worker on the current runtime.
    pub fn spawn(store: Arc<dyn Store>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = NotificationWorker { store, receiver };
        tokio::spawn(worker.run());
        Self { sender }
    }

    /// Enqueues `event`. Never blocks; a full or closed queue drops the event.
    pub fn dispatch(&self, event: NotificationEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!("Dropping notification event: {}", err);
        }
    }
}

struct NotificationWorker {
    store: Arc<dyn Store>,
    receiver: mpsc::Receiver<NotificationEvent>,
}

impl NotificationWorker {
    async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if let Err(err) = self.deliver(event).await {
                tracing::warn!("Error sending notification: {}", err);
            }
        }
        tracing::debug!("Notification queue closed, worker exiting");
    }

    async fn deliver(&self, event: NotificationEvent) -> Result<(), AppError> {
        let notifications = self.render(event).await?;

        let results = join_all(
            notifications
                .into_iter()
                .map(|notification| self.store.create_notification(notification)),
        )
        .await;

        for result in results {
            if let Err(err) = result {
                tracing::warn!("Failed to store notification: {}", err);
            }
        }
        Ok(())
    }

    async fn render(&self, event: NotificationEvent) -> Result<Vec<NewNotification>, AppError> {
        match event {
            NotificationEvent::Booking { booking, event } => {
                let service_name = self
                    .store
                    .find_service(booking.service_id)
                    .await?
                    .map(|s| s.name)
                    .unwrap_or_else(|| "your service".to_string());
                let template = booking_template(event, &service_name);
                let recipients = self
                    .resolve(template.recipients, booking.customer_id, booking.lawyer_id)
                    .await?;

                Ok(build(
                    &template,
                    recipients,
                    NotificationType::Booking,
                    booking.id,
                    RelatedModel::Booking,
                    format!("/bookings/{}", booking.id),
                ))
            }
            NotificationEvent::Payment { payment, event } => {
                let template = payment_template(event, payment.booking_id);
                let recipients = self
                    .resolve(template.recipients, payment.customer_id, payment.lawyer_id)
                    .await?;

                Ok(build(
                    &template,
                    recipients,
                    NotificationType::Payment,
                    payment.id,
                    RelatedModel::Payment,
                    format!("/payments/{}", payment.id),
                ))
            }
            NotificationEvent::Review { review } => {
                let Some(lawyer_id) = review.lawyer_id else {
                    return Ok(Vec::new());
                };
                let Some(lawyer) = self.store.find_lawyer(lawyer_id).await? else {
                    return Ok(Vec::new());
                };

                Ok(vec![NewNotification {
                    user_id: lawyer.user_id,
                    title: "New Review Received".to_string(),
                    message: format!("You have received a {}-star review", review.rating),
                    notification_type: NotificationType::Review,
                    related_id: Some(review.id),
                    related_model: Some(RelatedModel::Review),
                    action_url: Some(format!("/reviews/{}", review.id)),
                    priority: NotificationPriority::Medium,
                }])
            }
        }
    }

    /// Maps template recipients to user ids. The lawyer side is a profile id
    /// and has to be looked up.
    async fn resolve(
        &self,
        recipients: &[Recipient],
        customer_id: Uuid,
        lawyer_id: Uuid,
    ) -> Result<Vec<Uuid>, AppError> {
        let mut user_ids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            match recipient {
                Recipient::Customer => user_ids.push(customer_id),
                Recipient::Lawyer => match self.store.find_lawyer(lawyer_id).await? {
                    Some(lawyer) => user_ids.push(lawyer.user_id),
                    None => tracing::debug!(%lawyer_id, "lawyer profile missing, skipping"),
                },
            }
        }
        Ok(user_ids)
    }
}

fn build(
    template: &Template,
    recipients: Vec<Uuid>,
    notification_type: NotificationType,
    related_id: Uuid,
    related_model: RelatedModel,
    action_url: String,
) -> Vec<NewNotification> {
    recipients
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            title: template.title.to_string(),
            message: template.message.clone(),
            notification_type,
            related_id: Some(related_id),
            related_model: Some(related_model),
            action_url: Some(action_url.clone()),
            priority: NotificationPriority::Medium,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pocketlegal_common::{PageRequest, UserRole};
    use pocketlegal_database::{MemoryStore, NewUser, NotificationFilter, UserStore};

    #[test]
    fn test_cancellation_notifies_both_parties() {
        let template = booking_template(BookingEvent::Cancelled, "Will drafting");
        assert_eq!(template.recipients, &[Recipient::Customer, Recipient::Lawyer]);
        assert_eq!(template.message, "A booking for Will drafting has been cancelled");
    }

    #[test]
    fn test_only_non_pending_statuses_raise_events() {
        assert_eq!(BookingEvent::for_status(BookingStatus::Pending), None);
        assert_eq!(
            BookingEvent::for_status(BookingStatus::Rejected),
            Some(BookingEvent::Rejected)
        );
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (sender, mut receiver) = mpsc::channel(1);
        let dispatcher = NotificationDispatcher { sender };

        let review = |rating| Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            lawyer_id: None,
            service_id: None,
            rating,
            comment: None,
            is_published: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        dispatcher.dispatch(NotificationEvent::Review { review: review(5) });
        dispatcher.dispatch(NotificationEvent::Review { review: review(1) });

        match receiver.try_recv() {
            Ok(NotificationEvent::Review { review }) => assert_eq!(review.rating, 5),
            other => panic!("unexpected queue state {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_worker_writes_one_row_per_recipient() {
        let store = Arc::new(MemoryStore::new());
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

        let dispatcher = NotificationDispatcher::spawn(store.clone(), 8);
        let now = chrono::Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            customer_id: customer.id,
            lawyer_id: Uuid::new_v4(),
            amount: rust_decimal::Decimal::new(100, 0),
            currency: "USD".into(),
            payment_method: pocketlegal_common::PaymentMethod::CreditCard,
            status: pocketlegal_common::PaymentStatus::Refunded,
            transaction_id: None,
            refunded_amount: rust_decimal::Decimal::new(100, 0),
            refund_reason: None,
            refunded_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        dispatcher.dispatch(NotificationEvent::Payment {
            payment,
            event: PaymentEvent::Refunded,
        });

        let mut delivered = 0;
        for _ in 0..50 {
            delivered = store.count_unread(customer.id).await.unwrap();
            if delivered > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, 1);

        let page = store
            .list_notifications(customer.id, NotificationFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].title, "Payment Refunded");
        assert_eq!(page.items[0].notification_type, NotificationType::Payment);
    }
}
