use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use pocketlegal_auth::require_auth;

use crate::handlers::{
    bookings, cart, catalog, health, notifications, payments, reviews, users, wishlist,
};
use crate::services::AppState;

/// Every route of the service. Paths shared by a public and a protected
/// method are merged, so the bearer check only guards the protected method.
pub fn create_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        // Authentication
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        // Lawyer directory
        .route("/users/lawyers", get(users::list_lawyers))
        .route("/users/lawyers/:id", get(users::get_lawyer))
        // Catalog
        .route("/services", get(catalog::list_services))
        .route("/services/:id", get(catalog::get_service))
        .route("/services/categories", get(catalog::list_categories))
        .route("/services/categories/:id", get(catalog::get_category))
        // Published reviews
        .route("/services/:id/reviews", get(reviews::service_reviews))
        .route("/services/lawyers/:id/reviews", get(reviews::lawyer_reviews));

    let protected = Router::new()
        // Profile
        .route(
            "/users/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/users/password", put(users::update_password))
        .route("/users/lawyer/profile", put(users::update_lawyer_profile))
        .route("/users/lawyer/documents", put(users::update_lawyer_documents))
        // Cart
        .route(
            "/users/cart",
            post(cart::add_to_cart)
                .get(cart::get_cart)
                .delete(cart::clear_cart),
        )
        .route(
            "/users/cart/:id",
            put(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        // Wishlist
        .route(
            "/users/wishlist",
            post(wishlist::add_to_wishlist)
                .get(wishlist::get_wishlist)
                .delete(wishlist::clear_wishlist),
        )
        .route("/users/wishlist/:id", delete(wishlist::remove_wishlist_item))
        // Catalog administration
        .route("/services", post(catalog::create_service))
        .route(
            "/services/:id",
            put(catalog::update_service).delete(catalog::delete_service),
        )
        .route("/services/:id/lawyers", put(catalog::assign_lawyers))
        .route("/services/categories", post(catalog::create_category))
        .route(
            "/services/categories/:id",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        // Reviews
        .route("/services/reviews", post(reviews::create_review))
        .route("/services/reviews/user", get(reviews::my_reviews))
        .route(
            "/services/reviews/:id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        // Bookings
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::my_bookings),
        )
        .route("/bookings/checkout", post(bookings::checkout))
        .route("/bookings/lawyer", get(bookings::lawyer_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/status", put(bookings::update_status))
        .route("/bookings/:id/reschedule", post(bookings::reschedule))
        // Payments
        .route("/payments", get(payments::my_payments))
        .route("/payments/process", post(payments::process_payment))
        .route("/payments/refund", post(payments::refund))
        .route("/payments/lawyer", get(payments::lawyer_payments))
        .route("/payments/:id", get(payments::get_payment))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list_notifications).delete(notifications::clear_notifications),
        )
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route(
            "/notifications/:id",
            delete(notifications::delete_notification),
        )
        .route_layer(from_fn_with_state(state.jwt_service.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", public.merge(protected))
}
