//! Registration, sessions, order submission and withdrawals over HTTP

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{Session, TestApp, body_json, body_text, json_request};
use flate2::{Compression, write::GzEncoder};
use serde_json::json;
use std::io::Write;
use std::time::Duration;

#[tokio::test]
async fn register_sets_two_session_cookies() {
    let app = TestApp::new().await;
    let session = app.register("user111", "password111").await;

    assert_eq!(session.set_cookies.len(), 2);
    assert!(session.set_cookies.iter().any(|c| c.starts_with("username=user111")));
    assert!(session.set_cookies.iter().any(|c| c.starts_with("user_id=")));
    for c in &session.set_cookies {
        assert!(c.contains("Path=/"), "{c}");
        assert!(!c.contains("Max-Age"), "{c}");
    }
}

#[tokio::test]
async fn register_rejects_bad_input_and_duplicates() {
    let app = TestApp::new().await;

    let resp = app
        .send(json_request(
            "POST",
            "/api/user/register",
            json!({"login": "", "password": "x"}),
            None,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = Request::post("/api/user/register")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"login":"a","password":"b"}"#))
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::BAD_REQUEST);

    let req = Request::post("/api/user/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::BAD_REQUEST);

    app.register("user111", "password111").await;
    let resp = app
        .send(json_request(
            "POST",
            "/api/user/register",
            json!({"login": "user111", "password": "other"}),
            None,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_checks_credentials() {
    let app = TestApp::new().await;
    app.register("user111", "password111").await;

    let login = |password: &'static str, login: &'static str| {
        json_request(
            "POST",
            "/api/user/login",
            json!({"login": login, "password": password}),
            None,
        )
    };

    assert_eq!(
        app.send(login("wrong", "user111")).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.send(login("password111", "nobody")).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let resp = app.send(login("password111", "user111")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let session = Session::from_response(&resp);
    assert_eq!(
        app.get("/api/user/balance", Some(&session)).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn authenticated_routes_require_session() {
    let app = TestApp::new().await;

    for uri in [
        "/api/user/orders",
        "/api/user/balance",
        "/api/user/balance/withdraw",
    ] {
        assert_eq!(
            app.get(uri, None).await.status(),
            StatusCode::UNAUTHORIZED,
            "{uri}"
        );
    }

    let req = Request::post("/api/user/orders")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("123455"))
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .send(json_request(
            "POST",
            "/api/user/balance/withdraw",
            json!({"order": "84410807816", "sum": 1}),
            None,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_or_foreign_cookies_are_rejected() {
    let app = TestApp::new().await;
    let alice = app.register("user111", "password111").await;
    app.register("user112", "password112").await;

    // Claim another user's name with alice's token
    let token = alice
        .cookie
        .split("; ")
        .find(|c| c.starts_with("user_id="))
        .unwrap()
        .to_string();
    let forged = Session {
        cookie: format!("username=user112; {token}"),
        set_cookies: vec![],
    };
    assert_eq!(
        app.get("/api/user/balance", Some(&forged)).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let garbage = Session {
        cookie: "username=user111; user_id=deadbeef:cafe".into(),
        set_cookies: vec![],
    };
    assert_eq!(
        app.get("/api/user/balance", Some(&garbage)).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let unknown = Session {
        cookie: format!("username=ghost; {token}"),
        set_cookies: vec![],
    };
    assert_eq!(
        app.get("/api/user/balance", Some(&unknown)).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn session_is_bound_to_client_ip() {
    let app = TestApp::new().await;
    let session = app.register("user111", "password111").await;

    let same_ip = Request::get("/api/user/balance")
        .header(header::COOKIE, &session.cookie)
        .header("x-real-ip", "192.0.2.10")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(same_ip).await.status(), StatusCode::OK);

    let moved = Request::get("/api/user/balance")
        .header(header::COOKIE, &session.cookie)
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(moved).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_upload_outcomes() {
    let app = TestApp::new().await;
    let alice = app.register("user111", "password111").await;
    let bob = app.register("user112", "password112").await;

    let (status, body) = app.upload(&alice, "123455").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, "Order accepted");

    let (status, body) = app.upload(&alice, "123455").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Order already uploaded");

    let (status, _) = app.upload(&bob, "123455").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.upload(&alice, "1234.5").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app.upload(&alice, "79927398710").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let req = Request::post("/api/user/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &alice.cookie)
        .body(Body::from("79927398713"))
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_lists_are_no_content() {
    let app = TestApp::new().await;
    let session = app.register("user111", "password111").await;

    let resp = app.get("/api/user/orders", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_text(resp).await.is_empty());

    let resp = app.get("/api/user/balance/withdraw", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(app.balance(&session).await, (0.0, 0.0));
}

#[tokio::test]
async fn withdrawal_rules() {
    let app = TestApp::new().await;
    app.accrue_everything(100.0).await;
    let alice = app.register("user111", "password111").await;
    let bob = app.register("user112", "password112").await;

    app.upload(&alice, "123455").await;
    app.upload(&bob, "79927398713").await;
    app.wait_orders_final(&alice, Duration::from_secs(5)).await;
    assert_eq!(app.balance(&alice).await, (100.0, 0.0));

    // Happy path against a fresh number
    assert_eq!(app.withdraw(&alice, "84410807816", 1.0).await, StatusCode::OK);
    assert_eq!(app.balance(&alice).await, (99.0, 1.0));

    // More than available: refused, nothing changes
    assert_eq!(
        app.withdraw(&alice, "4561261212345467", 1000.0).await,
        StatusCode::PAYMENT_REQUIRED
    );
    assert_eq!(app.balance(&alice).await, (99.0, 1.0));

    // Luhn failure and another user's order
    assert_eq!(
        app.withdraw(&alice, "1234.5", 1.0).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        app.withdraw(&alice, "79927398713", 1.0).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    // Non-positive sum
    assert_eq!(
        app.withdraw(&alice, "4561261212345467", 0.0).await,
        StatusCode::BAD_REQUEST
    );

    // Against an order alice submitted herself
    assert_eq!(app.withdraw(&alice, "123455", 2.5).await, StatusCode::OK);
    assert_eq!(app.balance(&alice).await, (96.5, 3.5));

    // An order already withdrawn against is refused, the record stays as is
    assert_eq!(
        app.withdraw(&alice, "84410807816", 1.0).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(app.balance(&alice).await, (96.5, 3.5));

    let resp = app.get("/api/user/balance/withdraw", Some(&alice)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["order"], "123455");
    assert_eq!(list[0]["sum"], 2.5);
    assert_eq!(list[1]["order"], "84410807816");
    assert_eq!(list[1]["sum"], 1.0);
    assert!(list[0]["processed_at"].is_string());

    // The withdrawal-created order shows up as processed without accrual
    let orders = app.wait_orders_final(&alice, Duration::from_secs(1)).await;
    let created = orders
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["number"] == "84410807816")
        .unwrap();
    assert_eq!(created["status"], "PROCESSED");
    assert_eq!(created["accrual"], 0.0);
}

#[tokio::test]
async fn unknown_routes_and_methods_are_bad_requests() {
    let app = TestApp::new().await;

    assert_eq!(app.get("/", None).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        app.get("/api/user/unknown", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.get("/api/user/register", None).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn gzip_request_bodies_are_decoded() {
    let app = TestApp::new().await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(br#"{"login":"user111","password":"password111"}"#)
        .unwrap();
    let compressed = encoder.finish().unwrap();

    let req = Request::post("/api/user/register")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(compressed))
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let session = Session::from_response(&resp);
    assert_eq!(app.balance(&session).await, (0.0, 0.0));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::new().await;

    let resp = app.get("/api/user/balance", None).await;
    let generated = resp
        .headers()
        .get("x-request-id")
        .expect("request id assigned")
        .to_str()
        .unwrap();
    assert!(!generated.is_empty());

    let req = Request::get("/api/user/balance")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["x-request-id"], "trace-42");
}
