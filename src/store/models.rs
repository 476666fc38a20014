//! Ledger data models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Order status as stored and reported by `GET /api/user/orders`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    /// `INVALID` and `PROCESSED` end the accrual polling
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// ```text
    /// NEW ──► PROCESSING ──► PROCESSED
    ///   │               └──► INVALID
    ///   └──────────────────► (terminal directly)
    /// ```
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::New, OrderStatus::New) => false,
            (OrderStatus::New, _) => true,
            (OrderStatus::Processing, OrderStatus::Processing) => true,
            (OrderStatus::Processing, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Statuses an order may hold right before moving to `self`
    pub fn predecessors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::New => &[],
            OrderStatus::Processing | OrderStatus::Invalid | OrderStatus::Processed => {
                &[OrderStatus::New, OrderStatus::Processing]
            }
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Registered customer
#[derive(Debug, Clone)]
pub struct User {
    pub login: String,
    /// bcrypt hash
    pub password_hash: String,
    /// Per-user key of the session HMAC
    pub salt: String,
    pub balance: Decimal,
    pub withdrawn: Decimal,
}

/// Submitted (or withdrawal-created) order
#[derive(Debug, Clone)]
pub struct Order {
    pub number: String,
    pub owner: String,
    pub status: OrderStatus,
    pub accrual: Decimal,
    pub uploaded_at: DateTime<Utc>,
    pub withdrawn: Decimal,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Entry of the withdrawal history, derived from orders with `withdrawn > 0`
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Current balance pair of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}
