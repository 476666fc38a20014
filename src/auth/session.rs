//! Session token derivation
//!
//! ```text
//! digest = MD5(login || password_hash || client_ip)
//! sign   = HMAC-SHA256(key = salt, msg = digest)
//! token  = hex(digest) ":" hex(sign)
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

fn digest(login: &str, password_hash: &str, client_ip: &str) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume(login.as_bytes());
    ctx.consume(password_hash.as_bytes());
    ctx.consume(client_ip.as_bytes());
    ctx.compute().0
}

fn sign(salt: &str, digest: &[u8]) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).map_err(|_| AuthError::InvalidKey)?;
    mac.update(digest);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Token for the `user_id` cookie
pub fn issue_token(
    login: &str,
    password_hash: &str,
    client_ip: &str,
    salt: &str,
) -> Result<String, AuthError> {
    let digest = digest(login, password_hash, client_ip);
    let sign = sign(salt, &digest)?;
    Ok(format!("{}:{}", hex::encode(digest), hex::encode(sign)))
}

/// Recompute the token pair and compare it with `token`.
///
/// Malformed tokens (no separator, bad hex) are rejected, never an error.
pub fn verify_token(
    token: &str,
    login: &str,
    password_hash: &str,
    client_ip: &str,
    salt: &str,
) -> bool {
    let Some((digest_hex, sign_hex)) = token.split_once(':') else {
        return false;
    };
    let (Ok(given_digest), Ok(given_sign)) = (hex::decode(digest_hex), hex::decode(sign_hex))
    else {
        return false;
    };

    let expected_digest = digest(login, password_hash, client_ip);
    let Ok(expected_sign) = sign(salt, &expected_digest) else {
        return false;
    };

    let digest_ok: bool = expected_digest.as_slice().ct_eq(&given_digest).into();
    let sign_ok: bool = expected_sign.as_slice().ct_eq(&given_sign).into();
    digest_ok & sign_ok
}
