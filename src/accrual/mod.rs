//! External accrual calculator integration
//!
//! [`client`] talks HTTP to the calculator, [`worker`] drives one order per
//! task from `NEW` to a terminal status and credits the ledger.

pub mod client;
pub mod worker;

pub use client::{AccrualClient, AccrualError, AccrualSource, AccrualStatus, PollResult};
pub use worker::AccrualWorker;
