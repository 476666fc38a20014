//! Request handlers of `/api/user/*`

pub mod balance;
pub mod orders;
pub mod user;

use axum::http::{HeaderMap, header};

use crate::error::AppError;

/// Refuse requests whose `Content-Type` media type is not `expected`.
/// Parameters such as `; charset=utf-8` are allowed.
pub(crate) fn require_content_type(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if media_type.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(AppError::BadInput)
    }
}

/// Any route or method the API does not serve
pub async fn wrong_request() -> AppError {
    AppError::BadInput
}
