//! Request handlers. Each one validates its input, calls a service and wraps
//! the result in the `{success, message?, ...payload}` envelope. Errors are
//! rendered by `AppError`'s `IntoResponse`.

pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod users;
pub mod wishlist;

use axum::{http::StatusCode, Json};
use pocketlegal_common::{ApiResponse, AppError};

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub(crate) fn ok_with<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::with_message(message, data))))
}

pub(crate) fn created<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(message, data))))
}
