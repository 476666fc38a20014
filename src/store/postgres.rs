//! PostgreSQL ledger backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::sync::Arc;
use tracing::{debug, info};

use super::models::{Balance, Order, OrderStatus, User, Withdrawal};
use super::{Constraint, Store, StoreError};
use crate::db::Database;

const ORDER_COLUMNS: &str =
    "number, owner, status, accrual, uploaded_at, withdrawn, processed_at";

pub struct PgStore {
    db: Arc<Database>,
}

impl PgStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }

    async fn order_owner(&self, number: &str) -> Result<Option<String>, StoreError> {
        let owner = sqlx::query_scalar("SELECT owner FROM orders WHERE number = $1")
            .bind(number)
            .fetch_optional(self.pool())
            .await?;
        Ok(owner)
    }

    /// Tell `NotFound` from `InsufficientBalance` after a refused update
    async fn refused_update_reason(&self, owner: &str) -> StoreError {
        match sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE login = $1")
            .bind(owner)
            .fetch_optional(self.pool())
            .await
        {
            Ok(Some(_)) => StoreError::InsufficientBalance,
            Ok(None) => StoreError::NotFound,
            Err(e) => StoreError::Database(e),
        }
    }
}

/// Name of the violated unique constraint, if `e` is a unique violation
fn unique_violation(e: &sqlx::Error) -> Option<String> {
    let db_err = e.as_database_error()?;
    if db_err.is_unique_violation() {
        Some(db_err.constraint().unwrap_or_default().to_string())
    } else {
        None
    }
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        number: row.try_get("number")?,
        owner: row.try_get("owner")?,
        status: status
            .parse()
            .map_err(|e: super::models::UnknownStatus| StoreError::Corrupt(e.to_string()))?,
        accrual: row.try_get("accrual")?,
        uploaded_at: row.try_get("uploaded_at")?,
        withdrawn: row.try_get("withdrawn")?,
        processed_at: row.try_get("processed_at")?,
    })
}

fn status_names(statuses: &[OrderStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Conditional balance move: `None` when the user is missing or the result
/// would be negative.
async fn shift_balance(
    conn: &mut PgConnection,
    owner: &str,
    delta: Decimal,
) -> Result<Option<Balance>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE users
           SET balance = balance + $1,
               withdrawn = withdrawn + GREATEST(-$1, 0)
           WHERE login = $2 AND balance + $1 >= 0
           RETURNING balance, withdrawn"#,
    )
    .bind(delta)
    .bind(owner)
    .fetch_optional(conn)
    .await?;

    row.map(|r| {
        Ok(Balance {
            current: r.try_get("balance")?,
            withdrawn: r.try_get("withdrawn")?,
        })
    })
    .transpose()
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<(), StoreError> {
        let res = sqlx::query("INSERT INTO users (login, password, salt) VALUES ($1, $2, $3)")
            .bind(login)
            .bind(password_hash)
            .bind(salt)
            .execute(self.pool())
            .await;

        match res {
            Ok(_) => {
                info!(user = %login, "User created");
                Ok(())
            }
            Err(e) if unique_violation(&e).is_some() => {
                Err(StoreError::Conflict(Constraint::UserLogin))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, login: &str) -> Result<User, StoreError> {
        let row = sqlx::query(
            "SELECT login, password, salt, balance, withdrawn FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(self.pool())
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            login: row.try_get("login")?,
            password_hash: row.try_get("password")?,
            salt: row.try_get("salt")?,
            balance: row.try_get("balance")?,
            withdrawn: row.try_get("withdrawn")?,
        })
    }

    async fn create_order(&self, number: &str, owner: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            "INSERT INTO orders (number, owner, status, uploaded_at) VALUES ($1, $2, 'NEW', $3)",
        )
        .bind(number)
        .bind(owner)
        .bind(Utc::now())
        .execute(self.pool())
        .await;

        let err = match res {
            Ok(_) => {
                info!(order = %number, user = %owner, "Order created");
                return Ok(());
            }
            Err(e) => e,
        };

        if is_foreign_key_violation(&err) {
            return Err(StoreError::NotFound);
        }
        let Some(constraint) = unique_violation(&err) else {
            return Err(err.into());
        };
        debug!(order = %number, constraint = %constraint, "Order number already taken");

        // Postgres picks which of the two unique indexes reports first, so the
        // owner decides the outcome.
        match self.order_owner(number).await? {
            Some(existing) if existing == owner => {
                Err(StoreError::Conflict(Constraint::OrderNumberOwner))
            }
            _ => Err(StoreError::Conflict(Constraint::OrderNumber)),
        }
    }

    async fn get_orders(&self, owner: &str) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE owner = $1 ORDER BY uploaded_at DESC"
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn update_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"UPDATE orders SET status = $1, accrual = $2,
                   processed_at = CASE WHEN withdrawn > 0 THEN processed_at ELSE $3 END
               WHERE number = $4 AND status = ANY($5)"#,
        )
        .bind(status.as_str())
        .bind(accrual)
        .bind(Utc::now())
        .bind(number)
        .bind(status_names(status.predecessors()))
        .execute(self.pool())
        .await?;

        if res.rows_affected() > 0 {
            debug!(order = %number, status = %status, accrual = %accrual, "Order updated");
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE number = $1")
                .bind(number)
                .fetch_optional(self.pool())
                .await?;
        match current {
            None => Err(StoreError::NotFound),
            Some(from) => Err(StoreError::InvalidTransition {
                from: from
                    .parse()
                    .map_err(|e: super::models::UnknownStatus| StoreError::Corrupt(e.to_string()))?,
                to: status,
            }),
        }
    }

    async fn get_balance(&self, owner: &str) -> Result<Balance, StoreError> {
        let row = sqlx::query("SELECT balance, withdrawn FROM users WHERE login = $1")
            .bind(owner)
            .fetch_optional(self.pool())
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(Balance {
            current: row.try_get("balance")?,
            withdrawn: row.try_get("withdrawn")?,
        })
    }

    async fn apply_accrual(&self, owner: &str, delta: Decimal) -> Result<Balance, StoreError> {
        let mut conn = self.pool().acquire().await?;
        match shift_balance(&mut conn, owner, delta).await? {
            Some(balance) => {
                debug!(user = %owner, delta = %delta, balance = %balance.current, "Balance updated");
                Ok(balance)
            }
            None => Err(self.refused_update_reason(owner).await),
        }
    }

    async fn apply_withdrawal(
        &self,
        owner: &str,
        number: &str,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;

        // A number held by another user, or already withdrawn against, is
        // refused before the balance is touched
        let now: DateTime<Utc> = Utc::now();
        let recorded: Option<String> = sqlx::query_scalar(
            r#"INSERT INTO orders (number, owner, status, accrual, uploaded_at, withdrawn, processed_at)
               VALUES ($1, $2, 'PROCESSED', 0, $3, $4, $3)
               ON CONFLICT (number) DO UPDATE
                   SET withdrawn = EXCLUDED.withdrawn,
                       processed_at = EXCLUDED.processed_at
                   WHERE orders.owner = EXCLUDED.owner AND orders.withdrawn = 0
               RETURNING number"#,
        )
        .bind(number)
        .bind(owner)
        .bind(now)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound
            } else {
                StoreError::Database(e)
            }
        })?;

        if recorded.is_none() {
            tx.rollback().await?;
            return Err(StoreError::Conflict(Constraint::OrderNumber));
        }

        if shift_balance(&mut tx, owner, -amount).await?.is_none() {
            tx.rollback().await?;
            return Err(self.refused_update_reason(owner).await);
        }

        tx.commit().await?;
        info!(user = %owner, order = %number, sum = %amount, "Withdrawal applied");
        Ok(())
    }

    async fn get_withdrawals(&self, owner: &str) -> Result<Vec<Withdrawal>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT number, withdrawn, COALESCE(processed_at, uploaded_at) AS processed_at
               FROM orders
               WHERE owner = $1 AND withdrawn > 0
               ORDER BY processed_at DESC"#,
        )
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|r| -> Result<Withdrawal, StoreError> {
                Ok(Withdrawal {
                    order: r.try_get("number")?,
                    sum: r.try_get("withdrawn")?,
                    processed_at: r.try_get("processed_at")?,
                })
            })
            .collect()
    }

    async fn get_pending_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status IN ('NEW', 'PROCESSING') ORDER BY uploaded_at"
        ))
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn finalize_order(
        &self,
        owner: &str,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool().begin().await?;

        let res = sqlx::query(
            r#"UPDATE orders SET status = $1, accrual = $2,
                   processed_at = CASE WHEN withdrawn > 0 THEN processed_at ELSE $3 END
               WHERE number = $4 AND owner = $5 AND status = ANY($6)"#,
        )
        .bind(status.as_str())
        .bind(accrual)
        .bind(Utc::now())
        .bind(number)
        .bind(owner)
        .bind(status_names(status.predecessors()))
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE number = $1")
                .bind(number)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            if exists.is_none() {
                return Err(StoreError::NotFound);
            }
            debug!(order = %number, "Order already final, nothing to credit");
            return Ok(false);
        }

        if accrual > Decimal::ZERO && shift_balance(&mut tx, owner, accrual).await?.is_none() {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        info!(order = %number, user = %owner, status = %status, accrual = %accrual, "Order finalized");
        Ok(true)
    }
}
