use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use pocketlegal_common::AppError;

use crate::jwt::{Claims, JwtService};

/// Validates the bearer token and stores its [`Claims`] in the request
/// extensions. Mount with `axum::middleware::from_fn_with_state`.
pub async fn require_auth(
    State(jwt_service): State<Arc<JwtService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token_from_headers(request.headers())
        .ok_or_else(|| AppError::Authentication("Not authorized, no token".to_string()))?;

    let claims = jwt_service.validate_token(token)?;
    tracing::debug!(user_id = %claims.sub, role = %claims.role, "authenticated request");

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| AppError::Authentication("Not authorized, no token".to_string()))
    }
}

/// Extract JWT token from Authorization header
fn extract_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth_str.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}
