use chrono::{NaiveDate, NaiveTime};
use pocketlegal_common::*;
use pocketlegal_database::*;
use rust_decimal::Decimal;
use uuid::Uuid;

async fn connect() -> Option<PgStore> {
    // Skip test if no database is available
    let Ok(url) = std::env::var("DATABASE_URL") else {
        println!("Skipping database test - DATABASE_URL not set");
        return None;
    };

    let pool = sqlx::PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(PgStore::new(pool))
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_migrations_are_up_to_date() {
    let Some(store) = connect().await else { return };

    let status = MigrationRunner::new(store.pool().clone())
        .check_migration_status()
        .await
        .expect("Failed to read migration status");
    assert!(status.is_up_to_date, "{}", status);
}

#[tokio::test]
async fn test_booking_payment_review_flow() {
    let Some(store) = connect().await else { return };

    let customer = store
        .create_user(NewUser {
            name: "Customer".into(),
            email: unique_email("customer"),
            password_hash: "hash".into(),
            role: UserRole::Customer,
            phone: None,
        })
        .await
        .expect("Failed to create customer");

    let lawyer_user = store
        .create_user(NewUser {
            name: "Lawyer".into(),
            email: unique_email("lawyer"),
            password_hash: "hash".into(),
            role: UserRole::Lawyer,
            phone: None,
        })
        .await
        .expect("Failed to create lawyer");
    let lawyer = store
        .find_lawyer_by_user(lawyer_user.id)
        .await
        .unwrap()
        .expect("Lawyer profile was not created with the account");

    let category = store
        .create_category(NewCategory {
            name: format!("Category {}", Uuid::new_v4()),
            description: None,
            icon: None,
            parent_category: None,
            order: 1,
        })
        .await
        .unwrap();
    let service = store
        .create_service(NewService {
            name: "Will drafting".into(),
            description: "Drafting of a simple will".into(),
            short_description: None,
            category_id: category.id,
            base_price: Decimal::new(200, 0),
            duration: 60,
            lawyers: vec![lawyer.id],
            tags: vec!["estate".into()],
            featured: false,
        })
        .await
        .unwrap();

    let booking = store
        .create_booking(NewBooking {
            customer_id: customer.id,
            lawyer_id: lawyer.id,
            service_id: service.id,
            booking_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            total_amount: Decimal::new(200, 0),
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
    assert_eq!(booking.status, BookingStatus::Pending);

    let (payment, booking) = store
        .settle_payment(PaymentSettlement {
            booking_id: booking.id,
            customer_id: customer.id,
            lawyer_id: lawyer.id,
            amount: booking.total_amount,
            currency: "USD".into(),
            payment_method: PaymentMethod::CreditCard,
            status: PaymentStatus::Success,
            transaction_id: Some("DEMO_TEST".into()),
        })
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Completed);
    assert_eq!(booking.payment_id, Some(payment.id));

    let completed = store
        .update_booking_status(
            booking.id,
            StatusChange {
                expected: BookingStatus::Confirmed,
                status: BookingStatus::Completed,
                cancelled_by: None,
                cancellation_reason: None,
                note: Some((NoteField::Lawyer, "Done".into())),
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.lawyer_notes.as_deref(), Some("Done"));

    store
        .create_review(NewReview {
            user_id: customer.id,
            booking_id: booking.id,
            lawyer_id: Some(lawyer.id),
            service_id: Some(service.id),
            rating: 5,
            comment: Some("Great".into()),
        })
        .await
        .unwrap();

    let duplicate = store
        .create_review(NewReview {
            user_id: customer.id,
            booking_id: booking.id,
            lawyer_id: Some(lawyer.id),
            service_id: Some(service.id),
            rating: 1,
            comment: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(duplicate, AppError::Conflict(_)));

    let service = store.find_service(service.id).await.unwrap().unwrap();
    assert_eq!(service.rating, 5.0);
    assert_eq!(service.number_of_ratings, 1);
}
