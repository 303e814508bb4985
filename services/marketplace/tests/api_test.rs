use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use pocketlegal_common::UserRole;
use pocketlegal_database::MemoryStore;
use pocketlegal_marketplace::{build_app, config::Environment, AppConfig, AppState};

struct TestApp {
    server: TestServer,
    store: Arc<MemoryStore>,
}

fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), AppConfig::in_memory());
    let server = TestServer::new(build_app(state)).expect("Failed to start test server");
    TestApp { server, store }
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

/// Registers an account and returns `(token, user id)`.
async fn register(server: &TestServer, email: &str, role: &str) -> (String, Uuid) {
    let response = server
        .post("/api/users/register")
        .json(&json!({
            "name": "Test Account",
            "email": email,
            "password": "Password123!",
            "role": role,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    let token = body["token"].as_str().unwrap().to_string();
    let user_id = body["user"]["id"].as_str().unwrap().parse().unwrap();
    (token, user_id)
}

async fn login(server: &TestServer, email: &str) -> String {
    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": email, "password": "Password123!" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

/// Registers an account, promotes it in the store, then logs in again so
/// the token carries the admin role.
async fn admin_token(app: &TestApp) -> String {
    let (_, user_id) = register(&app.server, "admin@example.com", "customer").await;
    app.store
        .set_user_role(user_id, UserRole::Admin)
        .await
        .unwrap();
    login(&app.server, "admin@example.com").await
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let app = create_test_app();

    let response = app.server.get("/api/nowhere").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "NOT_FOUND");
    assert_eq!(body["message"], "Resource not found");
}

#[tokio::test]
async fn test_development_errors_carry_detail() {
    let app = create_test_app();

    let response = app.server.get("/api/bookings").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(body["errorCode"], "AUTHENTICATION_ERROR");
    assert_eq!(body["error"]["message"], "Not authorized, no token");
    assert_eq!(
        body["error"]["detail"],
        "Authentication error: Not authorized, no token"
    );
}

#[tokio::test]
async fn test_production_errors_omit_detail() {
    let config = AppConfig {
        environment: Environment::Production,
        ..AppConfig::in_memory()
    };
    let server = TestServer::new(build_app(AppState::in_memory(config)))
        .expect("Failed to start test server");

    let response = server.get("/api/nowhere").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Resource not found");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = create_test_app();
    let (_, user_id) = register(&app.server, "Jane@Example.com", "customer").await;

    // Emails are case-insensitive.
    let token = login(&app.server, "jane@example.com").await;

    let (name, value) = bearer(&token);
    let response = app.server.get("/api/users/profile").add_header(name, value).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"], user_id.to_string());
    assert_eq!(body["user"]["email"], "jane@example.com");
    assert!(body["user"].get("passwordHash").is_none());

    let duplicate = app
        .server
        .post("/api/users/register")
        .json(&json!({
            "name": "Again",
            "email": "jane@example.com",
            "password": "Password123!",
        }))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    let wrong = app
        .server
        .post("/api/users/login")
        .json(&json!({ "email": "jane@example.com", "password": "wrong-password" }))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cannot_self_register() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/users/register")
        .json(&json!({
            "name": "Mallory",
            "email": "mallory@example.com",
            "password": "Password123!",
            "role": "admin",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = create_test_app();

    app.server.get("/api/bookings").await.assert_status(StatusCode::UNAUTHORIZED);
    app.server.get("/api/users/cart").await.assert_status(StatusCode::UNAUTHORIZED);
    app.server.get("/api/notifications").await.assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("not-a-token");
    app.server
        .get("/api/users/profile")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Public listings stay open.
    app.server.get("/api/services").await.assert_status_ok();
    app.server.get("/api/services/categories").await.assert_status_ok();
}

#[tokio::test]
async fn test_lawyer_documents_upload() {
    let app = create_test_app();
    let server = &app.server;

    let (customer, _) = register(server, "visitor@example.com", "customer").await;
    let (name, value) = bearer(&customer);
    server
        .put("/api/users/lawyer/documents")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (lawyer, _) = register(server, "barrister@example.com", "lawyer").await;
    let (name, value) = bearer(&lawyer);
    let response = server
        .put("/api/users/lawyer/documents")
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Documents uploaded successfully");
    assert!(body["lawyer"]["documentsUploadedAt"].is_string());
    assert_eq!(body["lawyer"]["documentsVerified"], false);
}

#[tokio::test]
async fn test_booking_payment_review_flow() {
    let app = create_test_app();
    let server = &app.server;

    let admin = admin_token(&app).await;
    let (customer, _) = register(server, "client@example.com", "customer").await;
    let (lawyer, _) = register(server, "counsel@example.com", "lawyer").await;

    // The lawyer sets an hourly rate on the profile created at registration.
    let (name, value) = bearer(&lawyer);
    let response = server
        .put("/api/users/lawyer/profile")
        .add_header(name, value)
        .json(&json!({ "hourlyRate": "50", "bio": "Contract law" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let lawyer_id = body["lawyer"]["id"].as_str().unwrap().to_string();

    // Customers cannot manage the catalog.
    let (name, value) = bearer(&customer);
    server
        .post("/api/services/categories")
        .add_header(name, value)
        .json(&json!({ "name": "Family Law" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(&admin);
    let response = server
        .post("/api/services/categories")
        .add_header(name, value)
        .json(&json!({ "name": "Family Law" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let category_id = body["category"]["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&admin);
    let response = server
        .post("/api/services")
        .add_header(name, value)
        .json(&json!({
            "name": "Divorce consultation",
            "description": "One hour consultation on divorce proceedings",
            "categoryId": category_id,
            "basePrice": "100",
            "lawyers": [lawyer_id],
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let service_id = body["service"]["id"].as_str().unwrap().to_string();

    // Booking is priced at base price plus hourly rate.
    let (name, value) = bearer(&customer);
    let response = server
        .post("/api/bookings")
        .add_header(name, value)
        .json(&json!({
            "serviceId": service_id,
            "lawyerId": lawyer_id,
            "bookingDate": "2030-01-15",
            "startTime": "10:00:00",
            "endTime": "11:00:00",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["booking"]["status"], "pending");
    assert_eq!(body["booking"]["totalAmount"], "150");

    // A successful charge confirms the booking.
    let (name, value) = bearer(&customer);
    let response = server
        .post("/api/payments/process")
        .add_header(name, value)
        .json(&json!({ "bookingId": booking_id, "paymentMethod": "credit_card" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let payment_id = body["payment"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["payment"]["status"], "success");
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["booking"]["paymentStatus"], "completed");

    let (name, value) = bearer(&customer);
    server
        .post("/api/payments/process")
        .add_header(name, value)
        .json(&json!({ "bookingId": booking_id, "paymentMethod": "credit_card" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    // Reviews need a completed booking.
    let review = json!({ "bookingId": booking_id, "rating": 4, "serviceId": service_id });
    let (name, value) = bearer(&customer);
    server
        .post("/api/services/reviews")
        .add_header(name, value)
        .json(&review)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = bearer(&lawyer);
    let response = server
        .put(&format!("/api/bookings/{}/status", booking_id))
        .add_header(name, value)
        .json(&json!({ "status": "completed", "notes": "Advice given" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["booking"]["status"], "completed");
    assert_eq!(body["booking"]["lawyerNotes"], "Advice given");

    // Terminal bookings cannot move again.
    let (name, value) = bearer(&customer);
    server
        .put(&format!("/api/bookings/{}/status", booking_id))
        .add_header(name, value)
        .json(&json!({ "status": "cancelled" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let (name, value) = bearer(&customer);
    let response = server
        .post("/api/services/reviews")
        .add_header(name, value)
        .json(&review)
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server.get(&format!("/api/services/{}", service_id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["service"]["rating"], 4.0);
    assert_eq!(body["service"]["numberOfRatings"], 1);

    let response = server.get(&format!("/api/services/{}/reviews", service_id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 1);

    // Partial refund by the payee lawyer.
    let (name, value) = bearer(&lawyer);
    let response = server
        .post("/api/payments/refund")
        .add_header(name, value)
        .json(&json!({ "paymentId": payment_id, "amount": "40", "reason": "Short session" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["payment"]["status"], "partial_refund");
    assert_eq!(body["booking"]["paymentStatus"], "partial_refund");

    // Notifications are written by a background worker.
    let mut unread = 0;
    for _ in 0..50 {
        let (name, value) = bearer(&customer);
        let body: Value = server.get("/api/notifications").add_header(name, value).await.json();
        unread = body["unreadCount"].as_u64().unwrap_or(0);
        if unread >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // Payment success, completion and refund.
    assert!(unread >= 3, "only {} notifications arrived", unread);

    let (name, value) = bearer(&customer);
    let response = server
        .put("/api/notifications/read-all")
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let (name, value) = bearer(&customer);
    let body: Value = server.get("/api/notifications").add_header(name, value).await.json();
    assert_eq!(body["unreadCount"], 0);
}

#[tokio::test]
async fn test_cart_checkout_creates_bookings() {
    let app = create_test_app();
    let server = &app.server;

    let admin = admin_token(&app).await;
    let (customer, _) = register(server, "shopper@example.com", "customer").await;
    let (lawyer, _) = register(server, "advocate@example.com", "lawyer").await;

    let (name, value) = bearer(&lawyer);
    let body: Value = server.get("/api/users/profile").add_header(name, value).await.json();
    let lawyer_id = body["lawyer"]["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&admin);
    let body: Value = server
        .post("/api/services/categories")
        .add_header(name, value)
        .json(&json!({ "name": "Property" }))
        .await
        .json();
    let category_id = body["category"]["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&admin);
    let body: Value = server
        .post("/api/services")
        .add_header(name, value)
        .json(&json!({
            "name": "Lease review",
            "description": "Review of a residential lease",
            "categoryId": category_id,
            "basePrice": "80",
            "lawyers": [lawyer_id],
        }))
        .await
        .json();
    let service_id = body["service"]["id"].as_str().unwrap().to_string();

    let (name, value) = bearer(&customer);
    server
        .post("/api/bookings/checkout")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = bearer(&customer);
    server
        .post("/api/users/cart")
        .add_header(name, value)
        .json(&json!({
            "serviceId": service_id,
            "quantity": 2,
            "preferredDate": "2030-03-01",
            "preferredTimeSlot": "14:00-15:00",
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = bearer(&customer);
    let body: Value = server.get("/api/users/cart").add_header(name, value).await.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["totalAmount"], "160");

    let (name, value) = bearer(&customer);
    let response = server
        .post("/api/bookings/checkout")
        .add_header(name, value)
        .json(&json!({ "notes": "Please call first" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["bookingCount"], 1);
    assert_eq!(body["totalAmount"], "160");
    assert_eq!(body["bookings"][0]["startTime"], "14:00:00");
    assert_eq!(body["bookings"][0]["lawyerId"], lawyer_id);

    let (name, value) = bearer(&customer);
    let body: Value = server.get("/api/users/cart").add_header(name, value).await.json();
    assert_eq!(body["count"], 0);

    let (name, value) = bearer(&lawyer);
    let body: Value = server.get("/api/bookings/lawyer").add_header(name, value).await.json();
    assert_eq!(body["total"], 1);
}
