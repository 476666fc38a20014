//! Response bodies and error rendering
//!
//! Successful reads are bare JSON documents. Errors are plain text with the
//! status of [`AppError::http_status`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::store::{Balance, Order, OrderStatus, Withdrawal};

/// Entry of `GET /api/user/orders`
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    #[schema(example = "9278923470")]
    pub number: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 500)]
    pub accrual: Decimal,
    /// RFC3339
    #[schema(value_type = String, example = "2020-12-10T15:15:45+03:00")]
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderView {
    fn from(o: Order) -> Self {
        Self {
            number: o.number,
            status: o.status,
            accrual: o.accrual,
            uploaded_at: o.uploaded_at,
        }
    }
}

/// `GET /api/user/balance`
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceView {
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 500.5)]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 42)]
    pub withdrawn: Decimal,
}

impl From<Balance> for BalanceView {
    fn from(b: Balance) -> Self {
        Self {
            current: b.current,
            withdrawn: b.withdrawn,
        }
    }
}

/// Entry of `GET /api/user/balance/withdraw`
#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalView {
    #[schema(example = "2377225624")]
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 500)]
    pub sum: Decimal,
    #[schema(value_type = String, example = "2020-12-09T16:09:57+03:00")]
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(w: Withdrawal) -> Self {
        Self {
            order: w.order,
            sum: w.sum,
            processed_at: w.processed_at,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            AppError::Internal(detail) => {
                tracing::error!(code = self.code(), error = %detail, "Request failed");
            }
            _ => tracing::debug!(code = self.code(), status = status.as_u16(), "Request refused"),
        }

        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }
        (status, self.to_string()).into_response()
    }
}
