//! Policy rejections surfaced to callers.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::security::rate_limit::RouteClass;

/// A request refused by one of the ingress stages.
///
/// Every variant maps to a fixed status code and a machine-readable `code`.
/// Rejections are final; nothing in the pipeline retries them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Payload too large (limit {limit} bytes)")]
    PayloadTooLarge {
        limit: usize,
        declared: Option<u64>,
    },

    #[error("Origin not allowed: {origin}")]
    OriginNotAllowed {
        origin: String,
        request_id: Option<String>,
        /// Only populated outside production.
        allowed: Option<Vec<String>>,
    },

    #[error("Too many requests ({class} limit of {limit})")]
    RateLimited {
        class: RouteClass,
        limit: u32,
        retry_after: Duration,
    },

    #[error("Invalid JSON format")]
    MalformedJson,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::OriginNotAllowed { .. } => StatusCode::FORBIDDEN,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::MalformedJson => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Rejection::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Rejection::OriginNotAllowed { .. } => "ORIGIN_NOT_ALLOWED",
            Rejection::RateLimited { .. } => "RATE_LIMITED",
            Rejection::MalformedJson => "MALFORMED_JSON",
        }
    }

    /// JSON body sent with the rejection.
    pub fn body(&self) -> Value {
        match self {
            Rejection::PayloadTooLarge { limit, .. } => json!({
                "error": "Payload too large",
                "code": self.code(),
                "limit": limit,
            }),
            Rejection::OriginNotAllowed {
                origin,
                request_id,
                allowed,
            } => {
                let mut body = json!({
                    "error": "Origin not allowed",
                    "code": self.code(),
                    "origin": origin,
                });
                if let Some(id) = request_id {
                    body["requestId"] = json!(id);
                }
                if let Some(allowed) = allowed {
                    body["allowedOrigins"] = json!(allowed);
                }
                body
            }
            Rejection::RateLimited { retry_after, .. } => json!({
                "error": "Too many requests, please try again later",
                "code": self.code(),
                "retryAfter": retry_after_secs(*retry_after),
            }),
            Rejection::MalformedJson => json!({
                "error": "Invalid JSON format",
                "code": self.code(),
            }),
        }
    }

    /// Label used for logs and the rejection counter.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::PayloadTooLarge { .. } => "payload_too_large",
            Rejection::OriginNotAllowed { .. } => "origin_not_allowed",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::MalformedJson => "malformed_json",
        }
    }
}

/// Whole seconds a client must wait, rounded up and never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
