//! Password hashing and per-user salts

use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};

use super::AuthError;

pub const BCRYPT_COST: u32 = 10;
pub const SALT_LEN: usize = 12;

/// Random `[0-9A-Za-z]` string keying the session signature of one user
pub fn generate_salt() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// bcrypt the password off the async runtime
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hash)
}

/// Constant-time check of `password` against a stored bcrypt hash.
/// A malformed hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await?
        .unwrap_or(false);
    Ok(matched)
}
