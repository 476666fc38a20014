use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::require_content_type;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::{BalanceView, WithdrawRequest, WithdrawalView};
use crate::store::{Constraint, StoreError};
use crate::validation::OrderNumber;

/// Current balance and total withdrawn
#[utoipa::path(
    get,
    path = "/api/user/balance",
    responses(
        (status = 200, description = "Balance", body = BalanceView),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    ),
    security(("session_cookie" = [])),
    tag = "Balance"
)]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<BalanceView>, AppError> {
    match state.store.get_balance(&user.login).await {
        Ok(balance) => Ok(Json(balance.into())),
        Err(StoreError::NotFound) => Err(AppError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

/// Spend points against an order number
#[utoipa::path(
    post,
    path = "/api/user/balance/withdraw",
    request_body(content = WithdrawRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Withdrawal applied"),
        (status = 400, description = "Wrong content type, malformed JSON or non-positive sum"),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "Not enough points"),
        (status = 422, description = "Invalid order number"),
        (status = 500, description = "Internal server error")
    ),
    security(("session_cookie" = [])),
    tag = "Balance"
)]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    require_content_type(&headers, "application/json")?;
    let req: WithdrawRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Malformed withdrawal body");
        AppError::BadInput
    })?;
    if req.sum <= Decimal::ZERO {
        return Err(AppError::BadInput);
    }

    let number =
        OrderNumber::parse(req.order.as_bytes()).map_err(|_| AppError::WithdrawOrderInvalid)?;

    match state
        .store
        .apply_withdrawal(&user.login, number.as_str(), req.sum)
        .await
    {
        Ok(()) => {
            tracing::info!(user = %user.login, order = %number, sum = %req.sum, "Withdrawal accepted");
            Ok(StatusCode::OK)
        }
        Err(StoreError::Conflict(Constraint::OrderNumber)) => Err(AppError::WithdrawOrderInvalid),
        Err(StoreError::InsufficientBalance) => {
            tracing::info!(user = %user.login, sum = %req.sum, "Withdrawal exceeds balance");
            Err(AppError::InsufficientBalance)
        }
        Err(StoreError::NotFound) => Err(AppError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

/// Withdrawal history, newest first
#[utoipa::path(
    get,
    path = "/api/user/balance/withdraw",
    responses(
        (status = 200, description = "Withdrawal list", body = [WithdrawalView]),
        (status = 204, description = "No withdrawals yet"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    ),
    security(("session_cookie" = [])),
    tag = "Balance"
)]
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<WithdrawalView>>, AppError> {
    let withdrawals = state.store.get_withdrawals(&user.login).await?;
    if withdrawals.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(Json(
        withdrawals.into_iter().map(WithdrawalView::from).collect(),
    ))
}
