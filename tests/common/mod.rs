//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, RawQuery},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use ingress_guard::config::{EndpointLimit, IngressConfig};
use ingress_guard::http::{handlers, ClientIdentity, HttpServer};
use ingress_guard::lifecycle::Shutdown;

pub const FRONTEND: &str = "https://dormduos.com";

/// Small, fast-to-exhaust limits: general 3 per 10s, sensitive 2 per 10s.
pub fn test_config() -> IngressConfig {
    let mut config = IngressConfig::default();
    config.cors.allowed_origins = vec![FRONTEND.to_string(), "http://localhost:5173".to_string()];
    config.trust_proxy = Some(false);
    config.rate_limit.general.window_secs = 10;
    config.rate_limit.general.max_requests = 3;
    config.rate_limit.sensitive.window_secs = 10;
    config.rate_limit.sensitive.max_requests = 2;
    config.limits.max_body_bytes = 256;
    config.limits.endpoints = vec![EndpointLimit {
        path_prefix: "/api/uploads".to_string(),
        max_body_bytes: 4_096,
    }];
    config
}

/// Business routes that echo what they received after the pipeline ran.
pub fn app() -> Router {
    Router::new()
        .route("/api/listings", get(echo).post(echo))
        .route("/api/auth/login", post(echo))
        .route("/api/uploads", post(echo))
        .route("/api/legacy", get(legacy))
        .route("/api/negotiated", get(negotiated))
        .merge(handlers::routes())
}

async fn echo(
    Extension(client): Extension<ClientIdentity>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let parsed = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    Json(json!({
        "client": client.as_str(),
        "query": query,
        "body": parsed,
        "contentLength": headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok()),
    }))
}

async fn legacy() -> impl IntoResponse {
    (
        [
            (header::HeaderName::from_static("x-powered-by"), "Express"),
            (header::SERVER, "legacy/1.0"),
        ],
        "ok",
    )
}

async fn negotiated() -> impl IntoResponse {
    ([(header::VARY, "Accept-Encoding")], "ok")
}

pub fn router(config: IngressConfig) -> Router {
    HttpServer::new(config, app())
        .expect("test config should be valid")
        .router()
}

/// A request as it would arrive from `peer`.
pub fn request(method: &str, uri: &str, peer: &str) -> axum::http::request::Builder {
    let addr: SocketAddr = format!("{peer}:40000").parse().expect("peer ip");
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(extensions) = builder.extensions_mut() {
        extensions.insert(ConnectInfo(addr));
    }
    builder
}

pub fn json_request(method: &str, uri: &str, peer: &str, body: &str) -> Request<Body> {
    request(method, uri, peer)
        .header(header::ORIGIN, FRONTEND)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Serve `config` on an ephemeral localhost port.
pub async fn spawn_server(
    config: IngressConfig,
) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<Result<(), std::io::Error>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, app()).expect("test config should be valid");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, stop));

    (addr, shutdown, handle)
}
