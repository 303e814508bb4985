use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Postgres SQLSTATE codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or("constraint");
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return AppError::Conflict(format!("Duplicate record violates {}", constraint));
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::Conflict(format!("Record is still referenced ({})", constraint));
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

/// Body returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    pub error_code: String,
    pub timestamp: DateTime<Utc>,
    /// Only present outside production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ApiError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: error_code.into(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.error = Some(detail);
        self
    }
}

/// Unredacted description of a failure. Every `AppError` response carries
/// one in its extensions; a development-only layer copies it into the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRendering {
    /// `{success, message, errorCode, timestamp}` with internal errors redacted.
    Public,
    /// The public body plus `error: {message, detail}` with the full error text.
    Detailed,
}

// HTTP status code mapping
impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Payment(_) => "PAYMENT_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Payment(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut response = self.render(ErrorRendering::Public);
        response.extensions_mut().insert(self.detail());
        response.extensions_mut().insert(ErrorCode(self.error_code()));
        response
    }
}

impl AppError {
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            message: self.public_message(),
            detail: self.to_string(),
        }
    }

    pub fn render(&self, rendering: ErrorRendering) -> Response {
        let mut body = ApiError::new(self.error_code(), self.public_message());
        if rendering == ErrorRendering::Detailed {
            body = body.with_detail(self.detail());
        }
        (self.status_code(), Json(body)).into_response()
    }
}

/// Rebuilds an `AppError` response as its detailed form, keeping status and
/// error code. Other responses pass through untouched.
pub fn detailed_error_response(response: Response) -> Response {
    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    let status = response.status();
    let error_code = response
        .extensions()
        .get::<ErrorCode>()
        .map(|code| code.0)
        .unwrap_or("INTERNAL_ERROR");
    let body = ApiError::new(error_code, detail.message.clone()).with_detail(detail);
    (status, Json(body)).into_response()
}

/// Error code of an `AppError` response, kept in its extensions.
#[derive(Debug, Clone, Copy)]
struct ErrorCode(&'static str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Authorization("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Payment("x".into()).status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("connection reset by peer".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Conflict("Review already exists for this booking".into());
        assert_eq!(err.public_message(), "Review already exists for this booking");
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_public_rendering_redacts_internal_errors() {
        let response = AppError::Internal("pool timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["errorCode"], "INTERNAL_ERROR");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_detailed_rendering_exposes_the_cause() {
        let response =
            detailed_error_response(AppError::Internal("pool timed out".into()).into_response());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["errorCode"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "Internal server error");
        assert_eq!(body["error"]["detail"], "Internal server error: pool timed out");

        let response = detailed_error_response(AppError::Conflict("taken".into()).into_response());
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["errorCode"], "CONFLICT");
        assert_eq!(body["error"]["detail"], "Conflict: taken");
    }

    #[tokio::test]
    async fn test_detailed_rendering_ignores_other_responses() {
        let response = detailed_error_response((StatusCode::OK, "fine").into_response());
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<ErrorDetail>().is_none());
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }
}
