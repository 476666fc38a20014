//! Cookie session middleware for Axum.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::{TOKEN_COOKIE, USERNAME_COOKIE, session::verify_token};
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::store::StoreError;

/// Login of the verified session, inserted as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub login: String,
}

/// Client address the session is bound to.
///
/// `X-Real-IP` wins, then the first `X-Forwarded-For` hop, then the peer
/// socket address without its port. Empty when none is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let header_ip = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip = header_ip("x-real-ip")
            .or_else(|| header_ip("x-forwarded-for"))
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_default();
        ClientIp(ip)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let peer = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr);
        Ok(ClientIp::resolve(&parts.headers, peer))
    }
}

/// Value of cookie `name` across all `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub async fn cookie_auth_middleware(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let (Some(login), Some(token)) = (
        cookie_value(headers, USERNAME_COOKIE),
        cookie_value(headers, TOKEN_COOKIE),
    ) else {
        return Err(AppError::Unauthorized);
    };

    let user = match state.store.get_user(&login).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            tracing::warn!(user = %login, "Session for unknown user");
            return Err(AppError::Unauthorized);
        }
        Err(e) => {
            tracing::error!(user = %login, error = %e, "Failed to load session user");
            return Err(AppError::Internal(e.to_string()));
        }
    };

    if !verify_token(&token, &user.login, &user.password_hash, &ip, &user.salt) {
        tracing::warn!(user = %login, ip = %ip, "Session token rejected");
        return Err(AppError::Unauthorized);
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser { login: user.login });
    Ok(next.run(request).await)
}
