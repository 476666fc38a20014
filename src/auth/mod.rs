//! Session authentication
//!
//! Two cookies identify a session: `username` carries the login and
//! `user_id` carries a token bound to the login, the stored password hash
//! and the client IP, signed with the per-user salt. See [`session`].
//!
//! The IP binding is intentional: a session issued to one address is
//! rejected from any other, so clients roaming across NAT must log in again.
//!
//! The address comes from `X-Real-IP` / `X-Forwarded-For` when present (see
//! [`ClientIp`]). Those headers are client-controlled unless a trusted proxy
//! in front of the service overwrites them, so the binding only holds behind
//! such a proxy. Exposed directly, a stolen cookie replays with a forged
//! header.

pub mod middleware;
pub mod password;
pub mod session;

pub use middleware::{AuthenticatedUser, ClientIp, cookie_auth_middleware};
pub use password::{generate_salt, hash_password, verify_password};
pub use session::{issue_token, verify_token};

use thiserror::Error;

/// Cookie holding the login
pub const USERNAME_COOKIE: &str = "username";
/// Cookie holding the signed session token
pub const TOKEN_COOKIE: &str = "user_id";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid signing key")]
    InvalidKey,
}
