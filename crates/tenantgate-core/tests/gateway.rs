use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use tenantgate_core::auth::{MemoryTokenStore, TokenStore};
use tenantgate_core::{Config, ErrorKind, LoginRequest, Session, SessionGateway, SessionState};

async fn echo(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({ "authorization": auth }))
}

async fn login(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["password"] == "secret" {
        Ok(Json(json!({
            "refresh": "header.refresh.signature",
            "access": "header.payload.signature",
            "user_id": 42,
            "username": body["username"],
            "role_id": 1
        })))
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({ "late": true }))
}

/// Session-style login that returns a profile but no token.
async fn profile_only_login() -> Json<Value> {
    Json(json!({ "message": "ok", "user_id": 1, "username": "admin", "role_id": 1 }))
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/echo", get(echo))
        .route("/api/unauthorized", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/api/forbidden", get(|| async { (StatusCode::FORBIDDEN, "not your building") }))
        .route("/api/slow", get(slow))
        .route("/api/token/", post(login))
        .route("/api/users/auth/logout/", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn gateway(addr: SocketAddr, store: Arc<MemoryTokenStore>, timeout_ms: u64) -> SessionGateway {
    let config = Config {
        api_base_url: format!("http://{}/api", addr),
        request_timeout_ms: timeout_ms,
        ..Config::default()
    };
    SessionGateway::new(&config, Session::new(store)).unwrap()
}

#[tokio::test]
async fn test_attaches_bearer_token_when_present() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::with_token("abc.def.ghi"));
    let gw = gateway(addr, store, 5_000);

    let body: Value = gw.get("echo").await.unwrap();
    assert_eq!(body["authorization"], "Bearer abc.def.ghi");
}

#[tokio::test]
async fn test_no_header_when_anonymous() {
    let addr = spawn_server().await;
    let gw = gateway(addr, Arc::new(MemoryTokenStore::new()), 5_000);

    let body: Value = gw.get("/echo").await.unwrap();
    assert!(body["authorization"].is_null());
}

#[tokio::test]
async fn test_auth_rejection_clears_store() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::with_token("stale.token.value"));
    let gw = gateway(addr, store.clone(), 5_000);

    let err = gw.get::<Value>("unauthorized").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRejection);
    assert!(err.is_auth_rejection());
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(gw.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_other_errors_leave_store_untouched() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::with_token("good.token.value"));
    let gw = gateway(addr, store.clone(), 5_000);

    let err = gw.get::<Value>("forbidden").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Status);
    assert!(err.to_string().contains("not your building"));
    assert_eq!(store.get().unwrap().as_deref(), Some("good.token.value"));
}

#[tokio::test]
async fn test_network_failure_is_distinct_from_rejection() {
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = Arc::new(MemoryTokenStore::with_token("kept.token.value"));
    let gw = gateway(addr, store.clone(), 5_000);

    let err = gw.get::<Value>("echo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(!err.is_auth_rejection());
    assert!(store.get().unwrap().is_some());
}

#[tokio::test]
async fn test_timeout_is_reported_without_retry() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::with_token("kept.token.value"));
    let gw = gateway(addr, store.clone(), 200);

    let err = gw.get::<Value>("slow").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(store.get().unwrap().is_some());
}

#[tokio::test]
async fn test_login_stores_token() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let gw = gateway(addr, store.clone(), 5_000);

    let resp = gw
        .login(&LoginRequest::with_username("resident", "secret"))
        .await
        .unwrap();
    assert_eq!(resp.user_id, Some(42));
    assert_eq!(resp.username.as_deref(), Some("resident"));
    assert_eq!(resp.refresh.as_deref(), Some("header.refresh.signature"));
    assert_eq!(store.get().unwrap().as_deref(), Some("header.payload.signature"));
    assert_eq!(gw.session().state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_failed_login_stays_anonymous() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let gw = gateway(addr, store.clone(), 5_000);

    let err = gw
        .login(&LoginRequest::with_phone("13800000000", "wrong"))
        .await
        .unwrap_err();
    assert!(err.is_auth_rejection());
    assert_eq!(store.get().unwrap(), None);
}

#[tokio::test]
async fn test_logout_clears_even_when_server_fails() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::with_token("abc.def.ghi"));
    let gw = gateway(addr, store.clone(), 5_000);

    gw.logout().await.unwrap();
    assert_eq!(store.get().unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_requests_read_token_independently() {
    let addr = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::with_token("shared.token.value"));
    let gw = gateway(addr, store, 5_000);

    let (a, b) = tokio::join!(gw.get::<Value>("echo"), gw.get::<Value>("echo"));
    assert_eq!(a.unwrap()["authorization"], "Bearer shared.token.value");
    assert_eq!(b.unwrap()["authorization"], "Bearer shared.token.value");
}

#[tokio::test]
async fn test_login_without_token_in_response_stays_anonymous() {
    let app = Router::new().route("/api/token/", post(profile_only_login));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let store = Arc::new(MemoryTokenStore::new());
    let gw = gateway(addr, store.clone(), 5_000);

    let err = gw
        .login(&LoginRequest::with_username("admin", "secret"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(gw.session().state(), SessionState::Anonymous);
}
