//! Ledger store
//!
//! Durable persistence of users, orders, withdrawals and balances behind the
//! [`Store`] trait. Every balance mutation is a single conditional update
//! (`balance + delta >= 0`) so concurrent accrual workers and withdrawal
//! requests for the same user serialize inside the store.
//!
//! Backends:
//! - [`PgStore`] - PostgreSQL via sqlx
//! - [`MemoryStore`] - mutex-guarded in-process maps (tests, `memory://`)

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use models::{Balance, Order, OrderStatus, User, Withdrawal};
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Unique constraints whose violation callers need to tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `users.login`
    UserLogin,
    /// `orders.number`, held by a different owner
    OrderNumber,
    /// `(orders.number, orders.owner)`, the caller already submitted it
    OrderNumberOwner,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Constraint::UserLogin => "users_login_key",
            Constraint::OrderNumber => "orders_number_key",
            Constraint::OrderNumberOwner => "orders_number_owner_key",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    Conflict(Constraint),

    #[error("Record not found")]
    NotFound,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Ledger operations. All methods are atomic at the granularity documented
/// on each of them.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a user with zero balance. `Conflict(UserLogin)` if taken.
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<(), StoreError>;

    async fn get_user(&self, login: &str) -> Result<User, StoreError>;

    /// Insert an order in `NEW`.
    ///
    /// `Conflict(OrderNumberOwner)` when `owner` already submitted `number`,
    /// `Conflict(OrderNumber)` when somebody else did.
    async fn create_order(&self, number: &str, owner: &str) -> Result<(), StoreError>;

    /// Orders of `owner`, newest upload first
    async fn get_orders(&self, owner: &str) -> Result<Vec<Order>, StoreError>;

    /// Set status and accrual, stamping `processed_at = now`.
    /// The move must be allowed by the order state machine.
    async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<(), StoreError>;

    async fn get_balance(&self, owner: &str) -> Result<Balance, StoreError>;

    /// `balance += delta`, refusing to go below zero. A negative delta is
    /// also added (as its absolute value) to the withdrawn total.
    async fn apply_accrual(&self, owner: &str, delta: Decimal) -> Result<Balance, StoreError>;

    /// Debit `amount` and record it against order `number` in one step.
    ///
    /// An unknown number is created for `owner` as `PROCESSED` with zero
    /// accrual. A number held by another user, or one that already carries a
    /// withdrawal, is `Conflict(OrderNumber)`. On any failure nothing is
    /// mutated, and a recorded withdrawal is never changed afterwards.
    async fn apply_withdrawal(
        &self,
        owner: &str,
        number: &str,
        amount: Decimal,
    ) -> Result<(), StoreError>;

    /// Orders of `owner` with `withdrawn > 0`, newest first
    async fn get_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>, StoreError>;

    /// Orders still waiting for a terminal accrual status
    async fn get_pending_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Move an order to its terminal status and credit the accrual.
    ///
    /// Returns `false` without touching the ledger when the order is already
    /// terminal, so a re-driven order is never credited twice. Backends with
    /// transactions override this to make both steps one unit.
    async fn finalize_order(
        &self,
        owner: &str,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool, StoreError> {
        match self.update_order(number, status, accrual).await {
            Ok(()) => {}
            Err(StoreError::InvalidTransition { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        if accrual > Decimal::ZERO {
            self.apply_accrual(owner, accrual).await?;
        }
        Ok(true)
    }
}
