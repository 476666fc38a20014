//! Gophermart - loyalty points accounting service
//!
//! Customers register, submit order numbers, collect bonus points computed
//! by an external accrual calculator and spend them on later orders.
//!
//! # Modules
//!
//! - [`store`] - Ledger of users, orders and balances (PostgreSQL or in-memory)
//! - [`auth`] - Password hashing and IP-bound session cookies
//! - [`validation`] - Luhn check of order numbers
//! - [`accrual`] - Accrual calculator client and per-order polling worker
//! - [`gateway`] - HTTP routes, handlers and OpenAPI document
//! - [`config`] / [`logging`] - Process setup

pub mod accrual;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod store;
pub mod validation;

pub use accrual::{AccrualClient, AccrualWorker};
pub use config::AppConfig;
pub use error::AppError;
pub use gateway::{build_router, state::AppState};
pub use store::{MemoryStore, PgStore, Store, StoreError};
