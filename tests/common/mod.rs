//! Shared harness: in-memory store, stub accrual calculator, oneshot router

#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::connect_info::MockConnectInfo,
    http::{Request, Response, StatusCode, header},
};
use gophermart::accrual::{AccrualClient, AccrualWorker};
use gophermart::gateway::{build_router, state::AppState};
use gophermart::store::MemoryStore;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const POLL: Duration = Duration::from_millis(50);

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub accrual: MockServer,
}

impl TestApp {
    /// App whose accrual calculator answers nothing until mocks are mounted
    pub async fn new() -> Self {
        let accrual = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let client =
            AccrualClient::new(&accrual.uri(), Duration::from_secs(2), POLL).expect("client");
        let worker = Arc::new(AccrualWorker::new(store.clone(), Arc::new(client), POLL));
        let state = Arc::new(AppState::new(store.clone(), worker));
        let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        let router = build_router(state).layer(MockConnectInfo(peer));
        Self {
            router,
            store,
            accrual,
        }
    }

    /// Every order is PROCESSED with `accrual` points
    pub async fn accrue_everything(&self, accrual: f64) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/orders/\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order": "any",
                "status": "PROCESSED",
                "accrual": accrual
            })))
            .mount(&self.accrual)
            .await;
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn register(&self, login: &str, password: &str) -> Session {
        let resp = self
            .send(json_request(
                "POST",
                "/api/user/register",
                json!({"login": login, "password": password}),
                None,
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        Session::from_response(&resp)
    }

    pub async fn upload(&self, session: &Session, number: &str) -> (StatusCode, String) {
        let req = Request::post("/api/user/orders")
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::COOKIE, &session.cookie)
            .body(Body::from(number.to_string()))
            .unwrap();
        let resp = self.send(req).await;
        let status = resp.status();
        (status, body_text(resp).await)
    }

    pub async fn get(&self, uri: &str, session: Option<&Session>) -> Response<Body> {
        let mut req = Request::get(uri);
        if let Some(s) = session {
            req = req.header(header::COOKIE, &s.cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn balance(&self, session: &Session) -> (f64, f64) {
        let resp = self.get("/api/user/balance", Some(session)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_json(resp).await;
        (v["current"].as_f64().unwrap(), v["withdrawn"].as_f64().unwrap())
    }

    pub async fn withdraw(&self, session: &Session, order: &str, sum: f64) -> StatusCode {
        self.send(json_request(
            "POST",
            "/api/user/balance/withdraw",
            json!({"order": order, "sum": sum}),
            Some(session),
        ))
        .await
        .status()
    }

    /// Poll `GET /api/user/orders` until every order is terminal
    pub async fn wait_orders_final(&self, session: &Session, timeout: Duration) -> Value {
        let deadline = Instant::now() + timeout;
        loop {
            let resp = self.get("/api/user/orders", Some(session)).await;
            if resp.status() == StatusCode::OK {
                let orders = body_json(resp).await;
                let done = orders.as_array().unwrap().iter().all(|o| {
                    let s = o["status"].as_str().unwrap();
                    s == "PROCESSED" || s == "INVALID"
                });
                if done {
                    return orders;
                }
            }
            assert!(Instant::now() < deadline, "orders did not reach a final status");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// `Cookie` header built from a register/login response
pub struct Session {
    pub cookie: String,
    pub set_cookies: Vec<String>,
}

impl Session {
    pub fn from_response(resp: &Response<Body>) -> Self {
        let set_cookies: Vec<String> = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let cookie = set_cookies
            .iter()
            .map(|c| c.split(';').next().unwrap().trim().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            cookie,
            set_cookies,
        }
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: Value,
    session: Option<&Session>,
) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(s) = session {
        req = req.header(header::COOKIE, &s.cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
