//! Built-in routes served behind the ingress pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

/// Health route plus a JSON fallback for unknown paths.
///
/// Business routers are merged into this one by the caller.
pub fn routes() -> Router {
    Router::new()
        .route("/api/health", get(health))
        .fallback(not_found)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Housing API is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "code": "NOT_FOUND" })),
    )
        .into_response()
}
