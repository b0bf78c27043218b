//! Origin allowlist enforcement and CORS response headers.
//!
//! # Responsibilities
//! - Answer preflight requests without running any later stage
//! - Echo allowed origins verbatim (never `*` when credentials are on)
//! - Reject unknown origins with 403
//!
//! # Design Decisions
//! - Exact string match only; no pattern or suffix matching
//! - Requests without `Origin` follow an explicit configured policy
//! - The allowlist is only disclosed in non-production diagnostics

use std::collections::HashSet;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, Method};

use crate::config::{AbsentOrigin, ConfigError, CorsConfig, Environment};
use crate::config::validation::ValidationError;
use crate::error::Rejection;
use crate::pipeline::RequestHead;

/// Immutable origin policy resolved at startup.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
    /// Configuration order, for diagnostics.
    listed: Vec<String>,
    absent_origin: AbsentOrigin,
    methods: HeaderValue,
    headers: HeaderValue,
    allow_credentials: bool,
    max_age: Option<Duration>,
    diagnostics: bool,
}

impl OriginPolicy {
    pub fn from_config(config: &CorsConfig, environment: Environment) -> Result<Self, ConfigError> {
        let methods = join_header("cors.allowed_methods", &config.allowed_methods)?;
        let headers = join_header("cors.allowed_headers", &config.allowed_headers)?;

        Ok(Self {
            allowed: config.allowed_origins.iter().cloned().collect(),
            listed: config.allowed_origins.clone(),
            absent_origin: config.absent_origin,
            methods,
            headers,
            allow_credentials: config.allow_credentials,
            max_age: (config.max_age_secs > 0).then(|| Duration::from_secs(config.max_age_secs)),
            diagnostics: !environment.is_production(),
        })
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }

    pub fn absent_origin(&self) -> AbsentOrigin {
        self.absent_origin
    }
}

fn join_header(field: &str, values: &[String]) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(&values.join(", ")).map_err(|e| {
        ConfigError::Validation(vec![ValidationError {
            field: field.to_string(),
            message: e.to_string(),
        }])
    })
}

/// What the gate decided for one request.
#[derive(Debug)]
pub enum CorsOutcome {
    /// Preflight satisfied; respond immediately with these headers.
    Preflight(HeaderMap),
    /// Continue; attach these headers to the eventual response.
    Proceed(HeaderMap),
    Rejected(Rejection),
}

/// CORS stage of the pipeline.
#[derive(Debug, Clone)]
pub struct CorsGate {
    policy: OriginPolicy,
}

impl CorsGate {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    pub fn evaluate(&self, head: &RequestHead<'_>) -> CorsOutcome {
        let origin = match head.headers().get(header::ORIGIN) {
            Some(value) => value,
            None => return CorsOutcome::Proceed(self.absent_origin_headers()),
        };

        let origin = match origin.to_str() {
            Ok(o) if self.policy.is_allowed(o) => o,
            _ => {
                let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
                tracing::warn!(
                    origin = %origin,
                    client = %head.client(),
                    path = head.path(),
                    "CORS blocked origin"
                );
                return CorsOutcome::Rejected(Rejection::OriginNotAllowed {
                    origin,
                    request_id: head.request_id().map(str::to_string),
                    allowed: self.policy.diagnostics.then(|| self.policy.listed.clone()),
                });
            }
        };

        let mut headers = self.allowed_origin_headers(origin);
        if head.method() == Method::OPTIONS {
            if let Some(max_age) = self.policy.max_age {
                headers.insert(
                    header::ACCESS_CONTROL_MAX_AGE,
                    HeaderValue::from(max_age.as_secs()),
                );
            }
            return CorsOutcome::Preflight(headers);
        }
        CorsOutcome::Proceed(headers)
    }

    fn allowed_origin_headers(&self, origin: &str) -> HeaderMap {
        let mut headers = self.common_headers();
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if self.policy.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers
    }

    fn absent_origin_headers(&self) -> HeaderMap {
        let mut headers = self.common_headers();
        // Credentials are never combined with the wildcard.
        if self.policy.absent_origin == AbsentOrigin::Wildcard {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
        headers
    }

    fn common_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.policy.methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.policy.headers.clone());
        headers
    }
}
