//! OpenAPI document of the user API
//!
//! Exported by the `export_openapi` binary.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::types::{BalanceView, Credentials, OrderView, WithdrawRequest, WithdrawalView};
use crate::store::OrderStatus;

/// Session cookie issued by register/login
struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "user_id",
                    "hex(MD5(login || password_hash || client_ip)):hex(HMAC-SHA256(salt, digest)), \
                     sent together with the `username` cookie. Bound to the client IP.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gophermart Loyalty API",
        version = "1.0.0",
        description = "Loyalty points: submit order numbers, collect accruals, spend points."
    ),
    servers(
        (url = "http://127.0.0.1:8081", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::user::register,
        crate::gateway::handlers::user::login,
        crate::gateway::handlers::orders::upload_order,
        crate::gateway::handlers::orders::list_orders,
        crate::gateway::handlers::balance::get_balance,
        crate::gateway::handlers::balance::withdraw,
        crate::gateway::handlers::balance::list_withdrawals,
    ),
    components(
        schemas(
            Credentials,
            WithdrawRequest,
            OrderView,
            OrderStatus,
            BalanceView,
            WithdrawalView,
        )
    ),
    modifiers(&SessionCookieAddon),
    tags(
        (name = "User", description = "Registration and login"),
        (name = "Orders", description = "Order submission and accrual status"),
        (name = "Balance", description = "Points balance and withdrawals"),
    )
)]
pub struct ApiDoc;
