//! HTTP gateway
//!
//! Routes `/api/user/*` to the handlers. Session-protected routes run through
//! [`cookie_auth_middleware`]; anything unrouted answers 400. Request bodies
//! with `Content-Encoding: gzip` or `deflate` are decoded before dispatch.
//! Every request carries an `x-request-id` (kept if the client sent one),
//! echoed on the response; a panicking handler answers 500.

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    decompression::RequestDecompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::cookie_auth_middleware;
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/user/register", post(handlers::user::register))
        .route("/api/user/login", post(handlers::user::login));

    let private_routes = Router::new()
        .route(
            "/api/user/orders",
            post(handlers::orders::upload_order).get(handlers::orders::list_orders),
        )
        .route("/api/user/balance", get(handlers::balance::get_balance))
        .route(
            "/api/user/balance/withdraw",
            post(handlers::balance::withdraw).get(handlers::balance::list_withdrawals),
        )
        .route_layer(from_fn_with_state(state.clone(), cookie_auth_middleware));

    let router = Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .fallback(handlers::wrong_request)
        .method_not_allowed_fallback(handlers::wrong_request)
        .with_state(state);

    with_http_layers(router)
}

/// Request id, panic recovery, tracing and body codecs, outermost last
fn with_http_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Serve until Ctrl-C
pub async fn run_server(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await.inspect_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind");
    })?;
    tracing::info!(addr = %listener.local_addr()?, "Gophermart listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("handler failed")
    }

    fn exploding_router() -> Router {
        with_http_layers(Router::new().route("/boom", get(explode)))
    }

    #[tokio::test]
    async fn test_panicking_handler_answers_500() {
        let resp = exploding_router()
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().contains_key("x-request-id"));
    }
}
