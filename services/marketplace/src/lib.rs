pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    response::Response,
    Router,
};
use pocketlegal_common::{detailed_error_response, AppError};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::AppConfig;
pub use services::AppState;

/// Builds the complete HTTP application around `state`.
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let mut router = routes::create_routes(&state).fallback(handler_404);
    if !state.config.is_production() {
        router = router.layer(middleware::map_response(expose_error_detail));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Development builds answer errors with `error: {message, detail}` too.
async fn expose_error_detail(response: Response) -> Response {
    detailed_error_response(response)
}

async fn handler_404() -> AppError {
    AppError::NotFound("Resource not found".to_string())
}
