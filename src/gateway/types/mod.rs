//! Wire types of the user API
//!
//! - [`request`]: JSON bodies accepted by the handlers
//! - [`response`]: JSON bodies returned, plus the plain-text error rendering

pub mod request;
pub mod response;

pub use request::{Credentials, WithdrawRequest};
pub use response::{BalanceView, OrderView, WithdrawalView};
