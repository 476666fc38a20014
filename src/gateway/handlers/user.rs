use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::AppendHeaders,
};
use cookie::Cookie;
use std::sync::Arc;

use super::require_content_type;
use crate::auth::{
    ClientIp, TOKEN_COOKIE, USERNAME_COOKIE, generate_salt, hash_password, issue_token,
    verify_password,
};
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::Credentials;
use crate::store::StoreError;

type SessionCookies = (StatusCode, AppendHeaders<[(header::HeaderName, String); 2]>);

fn parse_credentials(headers: &HeaderMap, body: &[u8]) -> Result<Credentials, AppError> {
    require_content_type(headers, "application/json")?;
    let creds: Credentials = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Malformed credentials body");
        AppError::BadInput
    })?;
    if !creds.is_complete() {
        return Err(AppError::BadInput);
    }
    Ok(creds)
}

/// `username` and `user_id` session cookies, path `/`, no expiry
fn session_cookies(
    login: &str,
    password_hash: &str,
    ip: &str,
    salt: &str,
) -> Result<SessionCookies, AppError> {
    let token = issue_token(login, password_hash, ip, salt)?;
    let username = Cookie::build((USERNAME_COOKIE, login.to_string()))
        .path("/")
        .build();
    let user_id = Cookie::build((TOKEN_COOKIE, token)).path("/").build();
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (header::SET_COOKIE, username.to_string()),
            (header::SET_COOKIE, user_id.to_string()),
        ]),
    ))
}

/// Register a user and open a session
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body(content = Credentials, content_type = "application/json"),
    responses(
        (status = 200, description = "Registered, session cookies set"),
        (status = 400, description = "Wrong content type, malformed JSON or empty field"),
        (status = 409, description = "Login already taken"),
        (status = 500, description = "Internal server error")
    ),
    tag = "User"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SessionCookies, AppError> {
    let creds = parse_credentials(&headers, &body)?;

    let password_hash = hash_password(&creds.password).await?;
    let salt = generate_salt();
    state
        .store
        .create_user(&creds.login, &password_hash, &salt)
        .await
        .inspect_err(|e| {
            if matches!(e, StoreError::Conflict(_)) {
                tracing::info!(user = %creds.login, "Login already registered");
            }
        })?;

    tracing::info!(user = %creds.login, "User registered");
    session_cookies(&creds.login, &password_hash, &ip, &salt)
}

/// Check credentials and open a session
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body(content = Credentials, content_type = "application/json"),
    responses(
        (status = 200, description = "Authenticated, session cookies set"),
        (status = 400, description = "Wrong content type, malformed JSON or empty field"),
        (status = 401, description = "Wrong login or password"),
        (status = 500, description = "Internal server error")
    ),
    tag = "User"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SessionCookies, AppError> {
    let creds = parse_credentials(&headers, &body)?;

    let user = match state.store.get_user(&creds.login).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::WrongCredentials),
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&creds.password, &user.password_hash).await? {
        tracing::warn!(user = %creds.login, "Wrong password");
        return Err(AppError::WrongCredentials);
    }

    tracing::info!(user = %user.login, "User logged in");
    session_cookies(&user.login, &user.password_hash, &ip, &user.salt)
}
