//! In-process ledger backend
//!
//! One mutex guards users and orders together, so every trait method is a
//! single critical section and the same atomicity rules hold as for
//! [`super::PgStore`].

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::models::{Balance, Order, OrderStatus, User, Withdrawal};
use super::{Constraint, Store, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    /// Keyed by order number (globally unique)
    orders: HashMap<String, Order>,
}

impl Inner {
    fn shift_balance(&mut self, owner: &str, delta: Decimal) -> Result<Balance, StoreError> {
        let user = self.users.get_mut(owner).ok_or(StoreError::NotFound)?;
        let next = user.balance + delta;
        if next < Decimal::ZERO {
            return Err(StoreError::InsufficientBalance);
        }
        user.balance = next;
        if delta < Decimal::ZERO {
            user.withdrawn += delta.abs();
        }
        Ok(Balance {
            current: user.balance,
            withdrawn: user.withdrawn,
        })
    }

    fn set_status(
        &mut self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<&Order, StoreError> {
        let order = self.orders.get_mut(number).ok_or(StoreError::NotFound)?;
        if !order.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }
        order.status = status;
        order.accrual = accrual;
        // The timestamp of an applied withdrawal belongs to its history entry
        if order.withdrawn.is_zero() {
            order.processed_at = Some(Utc::now());
        }
        Ok(order)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.users.contains_key(login) {
            return Err(StoreError::Conflict(Constraint::UserLogin));
        }
        inner.users.insert(
            login.to_string(),
            User {
                login: login.to_string(),
                password_hash: password_hash.to_string(),
                salt: salt.to_string(),
                balance: Decimal::ZERO,
                withdrawn: Decimal::ZERO,
            },
        );
        info!(user = %login, "User created");
        Ok(())
    }

    async fn get_user(&self, login: &str) -> Result<User, StoreError> {
        self.lock()
            .users
            .get(login)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_order(&self, number: &str, owner: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.users.contains_key(owner) {
            return Err(StoreError::NotFound);
        }
        if let Some(existing) = inner.orders.get(number) {
            return Err(StoreError::Conflict(if existing.owner == owner {
                Constraint::OrderNumberOwner
            } else {
                Constraint::OrderNumber
            }));
        }
        inner.orders.insert(
            number.to_string(),
            Order {
                number: number.to_string(),
                owner: owner.to_string(),
                status: OrderStatus::New,
                accrual: Decimal::ZERO,
                uploaded_at: Utc::now(),
                withdrawn: Decimal::ZERO,
                processed_at: None,
            },
        );
        info!(order = %number, user = %owner, "Order created");
        Ok(())
    }

    async fn get_orders(&self, owner: &str) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| o.owner == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<(), StoreError> {
        self.lock().set_status(number, status, accrual)?;
        debug!(order = %number, status = %status, accrual = %accrual, "Order updated");
        Ok(())
    }

    async fn get_balance(&self, owner: &str) -> Result<Balance, StoreError> {
        let inner = self.lock();
        let user = inner.users.get(owner).ok_or(StoreError::NotFound)?;
        Ok(Balance {
            current: user.balance,
            withdrawn: user.withdrawn,
        })
    }

    async fn apply_accrual(&self, owner: &str, delta: Decimal) -> Result<Balance, StoreError> {
        let balance = self.lock().shift_balance(owner, delta)?;
        debug!(user = %owner, delta = %delta, balance = %balance.current, "Balance updated");
        Ok(balance)
    }

    async fn apply_withdrawal(
        &self,
        owner: &str,
        number: &str,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();

        // Check the order slot before the debit so a refusal mutates nothing.
        // One withdrawal per order: an applied one is never rewritten.
        if let Some(existing) = inner.orders.get(number)
            && (existing.owner != owner || !existing.withdrawn.is_zero())
        {
            return Err(StoreError::Conflict(Constraint::OrderNumber));
        }

        inner.shift_balance(owner, -amount)?;

        let now = Utc::now();
        let order = inner
            .orders
            .entry(number.to_string())
            .or_insert_with(|| Order {
                number: number.to_string(),
                owner: owner.to_string(),
                status: OrderStatus::Processed,
                accrual: Decimal::ZERO,
                uploaded_at: now,
                withdrawn: Decimal::ZERO,
                processed_at: None,
            });
        order.withdrawn = amount;
        order.processed_at = Some(now);

        info!(user = %owner, order = %number, sum = %amount, "Withdrawal applied");
        Ok(())
    }

    async fn get_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>, StoreError> {
        let mut withdrawals: Vec<Withdrawal> = self
            .lock()
            .orders
            .values()
            .filter(|o| o.owner == owner && o.withdrawn > Decimal::ZERO)
            .map(|o| Withdrawal {
                order: o.number.clone(),
                sum: o.withdrawn,
                processed_at: o.processed_at.unwrap_or(o.uploaded_at),
            })
            .collect();
        withdrawals.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(withdrawals)
    }

    async fn get_pending_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut pending: Vec<Order> = self
            .lock()
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(pending)
    }

    async fn finalize_order(
        &self,
        owner: &str,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();

        let order = inner.orders.get(number).ok_or(StoreError::NotFound)?;
        if order.owner != owner || !order.status.can_transition_to(status) {
            debug!(order = %number, "Order already final, nothing to credit");
            return Ok(false);
        }
        if accrual > Decimal::ZERO && !inner.users.contains_key(owner) {
            return Err(StoreError::NotFound);
        }

        inner.set_status(number, status, accrual)?;
        if accrual > Decimal::ZERO {
            inner.shift_balance(owner, accrual)?;
        }

        info!(order = %number, user = %owner, status = %status, accrual = %accrual, "Order finalized");
        Ok(true)
    }
}
