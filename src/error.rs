//! API error kinds
//!
//! Each variant maps to exactly one HTTP status. Handlers convert store and
//! auth failures into these and the gateway renders them as plain text.

use thiserror::Error;

use crate::auth::AuthError;
use crate::store::{Constraint, StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    /// Wrong content type, malformed JSON, empty field
    #[error("Incorrect request format")]
    BadInput,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Wrong username or password")]
    WrongCredentials,

    #[error("There are not enough funds in the account")]
    InsufficientBalance,

    #[error("User already exists")]
    UserConflict,

    #[error("Order already created by another user")]
    OrderOwnedByOtherUser,

    /// Idempotent re-submission, reported as success
    #[error("Order already uploaded")]
    OrderOwnedBySameUser,

    #[error("Incorrect order format")]
    LuhnInvalid,

    #[error("Invalid order number")]
    WithdrawOrderInvalid,

    /// Empty result list
    #[error("No content")]
    NotFound,

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadInput => "BAD_INPUT",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::WrongCredentials => "WRONG_CREDENTIALS",
            AppError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            AppError::UserConflict => "USER_CONFLICT",
            AppError::OrderOwnedByOtherUser => "ORDER_OWNED_BY_OTHER_USER",
            AppError::OrderOwnedBySameUser => "ORDER_OWNED_BY_SAME_USER",
            AppError::LuhnInvalid => "LUHN_INVALID",
            AppError::WithdrawOrderInvalid => "WITHDRAW_ORDER_INVALID",
            AppError::NotFound => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AppError::OrderOwnedBySameUser => 200,
            AppError::NotFound => 204,
            AppError::BadInput => 400,
            AppError::Unauthorized | AppError::WrongCredentials => 401,
            AppError::InsufficientBalance => 402,
            AppError::UserConflict | AppError::OrderOwnedByOtherUser => 409,
            AppError::LuhnInvalid | AppError::WithdrawOrderInvalid => 422,
            AppError::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(Constraint::UserLogin) => AppError::UserConflict,
            StoreError::Conflict(Constraint::OrderNumber) => AppError::OrderOwnedByOtherUser,
            StoreError::Conflict(Constraint::OrderNumberOwner) => AppError::OrderOwnedBySameUser,
            StoreError::InsufficientBalance => AppError::InsufficientBalance,
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Internal(err.to_string())
    }
}
