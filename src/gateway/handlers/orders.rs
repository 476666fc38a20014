use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use super::require_content_type;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::gateway::state::AppState;
use crate::gateway::types::OrderView;
use crate::store::StoreError;
use crate::validation::OrderNumber;

/// Submit an order number for accrual
#[utoipa::path(
    post,
    path = "/api/user/orders",
    request_body(content = String, content_type = "text/plain", example = "12345678903"),
    responses(
        (status = 202, description = "Order accepted for processing"),
        (status = 200, description = "Order already uploaded by this user"),
        (status = 400, description = "Wrong content type"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Order already uploaded by another user"),
        (status = 422, description = "Order number fails the Luhn check"),
        (status = 500, description = "Internal server error")
    ),
    security(("session_cookie" = [])),
    tag = "Orders"
)]
pub async fn upload_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), AppError> {
    require_content_type(&headers, "text/plain")?;

    let number = OrderNumber::parse(&body).map_err(|e| {
        tracing::debug!(user = %user.login, error = %e, "Rejected order number");
        AppError::LuhnInvalid
    })?;

    match state.store.create_order(number.as_str(), &user.login).await {
        Ok(()) => {}
        Err(StoreError::NotFound) => return Err(AppError::Unauthorized),
        Err(e) => return Err(e.into()),
    }

    state.worker.spawn(user.login, number.into_string());
    Ok((StatusCode::ACCEPTED, "Order accepted"))
}

/// Orders of the session user, newest first
#[utoipa::path(
    get,
    path = "/api/user/orders",
    responses(
        (status = 200, description = "Order list", body = [OrderView]),
        (status = 204, description = "No orders yet"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    ),
    security(("session_cookie" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let orders = state.store.get_orders(&user.login).await?;
    if orders.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}
