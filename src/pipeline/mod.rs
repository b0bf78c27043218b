//! Ingress pipeline: the fixed sequence of security stages every request
//! passes before reaching a business handler.
//!
//! # Data Flow
//! ```text
//! RequestHead
//!     → SizeGuard        413 if the declared body is over the ceiling
//!     → HeaderHardener   records hardening headers (never stops)
//!     → CorsGate         204 for preflight, 403 for unknown origins
//!     → TieredRateLimiter 429 when the client's window is full
//!     → Clearance        (headers for the eventual response)
//! Payload / query
//!     → PayloadSanitizer operator keys stripped
//!     → business handler
//! ```
//!
//! # Design Decisions
//! - Header-only stages run before the body is read, so rejected requests
//!   never pay for buffering or parsing
//! - Every terminal response carries the hardening headers
//! - Stages never block; all decisions come from in-memory state

pub mod decision;
pub mod request;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::http::{uri::PathAndQuery, StatusCode, Uri};
use serde_json::Value;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, IngressConfig};
use crate::error::Rejection;
use crate::observability::metrics;
use crate::security::{
    query, CorsGate, CorsOutcome, HeaderHardener, OriginPolicy, PayloadSanitizer,
    SanitizationPolicy, SizeGuard, TieredRateLimiter,
};

pub use decision::{Clearance, PipelineDecision, TerminalResponse};
pub use request::{IngressRequest, Payload, RequestHead};

/// A request that passed every stage.
#[derive(Debug)]
pub struct Admitted {
    pub request: IngressRequest,
    pub clearance: Clearance,
}

/// Owns the stages and runs them in order.
#[derive(Debug)]
pub struct IngressPipeline {
    size_guard: SizeGuard,
    hardener: HeaderHardener,
    cors: CorsGate,
    rate_limits: Arc<TieredRateLimiter>,
    sanitizer: PayloadSanitizer,
    trust_proxy: bool,
}

impl IngressPipeline {
    pub fn new(
        size_guard: SizeGuard,
        hardener: HeaderHardener,
        cors: CorsGate,
        rate_limits: Arc<TieredRateLimiter>,
        sanitizer: PayloadSanitizer,
    ) -> Self {
        Self {
            size_guard,
            hardener,
            cors,
            rate_limits,
            sanitizer,
            trust_proxy: false,
        }
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    /// Validate `config` and resolve it into immutable stage policies.
    pub fn from_config(config: &IngressConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let pipeline = Self::new(
            SizeGuard::from_config(&config.limits),
            HeaderHardener::new(config.environment, &config.headers),
            CorsGate::new(OriginPolicy::from_config(&config.cors, config.environment)?),
            Arc::new(TieredRateLimiter::from_config(&config.rate_limit)),
            PayloadSanitizer::new(SanitizationPolicy::from_config(&config.sanitize)),
        )
        .with_trust_proxy(config.trusts_proxy());

        tracing::info!(
            environment = %config.environment,
            origins = config.cors.allowed_origins.len(),
            trust_proxy = pipeline.trust_proxy,
            "Ingress pipeline ready"
        );
        if !config.rate_limit.enabled {
            tracing::warn!("Rate limiting is disabled; no client quota will be enforced");
        }
        Ok(pipeline)
    }

    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
    }

    pub fn rate_limits(&self) -> &Arc<TieredRateLimiter> {
        &self.rate_limits
    }

    pub fn sanitizer(&self) -> &PayloadSanitizer {
        &self.sanitizer
    }

    /// Body ceiling for `path`, used to bound buffering.
    pub fn body_limit(&self, path: &str) -> usize {
        self.size_guard.limit_for(path)
    }

    /// Run the header-only stages: size guard, hardening, CORS, rate limits.
    pub fn screen(&self, head: &RequestHead<'_>, now: Instant) -> PipelineDecision<Clearance> {
        // Hardening applies to every response, including a 413 from the size guard.
        let mut clearance = Clearance::default();
        self.hardener.apply(&mut clearance);

        if let Err(rejection) = self.size_guard.check(head) {
            return self.reject(rejection, &clearance);
        }

        match self.cors.evaluate(head) {
            CorsOutcome::Proceed(headers) => clearance.extend(headers),
            CorsOutcome::Preflight(headers) => {
                clearance.extend(headers);
                metrics::record_preflight();
                let mut response = TerminalResponse::empty(StatusCode::NO_CONTENT);
                clearance.apply_to(&mut response.headers);
                return PipelineDecision::Terminate(response);
            }
            CorsOutcome::Rejected(rejection) => return self.reject(rejection, &clearance),
        }

        match self.rate_limits.check(head.client(), head.path(), now) {
            Ok(Some(decision)) => clearance.record_quota(decision),
            Ok(None) => {}
            Err(rejection) => return self.reject(rejection, &clearance),
        }

        PipelineDecision::Continue(clearance)
    }

    /// Sanitize a decoded body. Returns the replacement only if keys were stripped.
    pub fn clean(&self, payload: &Payload) -> Option<Payload> {
        match payload {
            Payload::Json(value) => self.sanitize_value("body", value).map(Payload::Json),
            Payload::Form(bytes) => self
                .sanitize_pairs("body", bytes)
                .map(|kept| Payload::Form(Bytes::from(kept))),
            Payload::Empty | Payload::Raw(_) => None,
        }
    }

    /// Sanitize the query string. Returns the rewritten URI only if keys were stripped.
    pub fn clean_query(&self, uri: &Uri) -> Option<Uri> {
        let kept = self.sanitize_pairs("query", uri.query()?.as_bytes())?;
        let kept = String::from_utf8_lossy(&kept);
        replace_query(uri, &kept).or_else(|| replace_query(uri, ""))
    }

    /// Every stage in order over an already buffered request.
    pub fn run(&self, mut request: IngressRequest, now: Instant) -> PipelineDecision<Admitted> {
        let clearance = match self.screen(&request.head(), now) {
            PipelineDecision::Continue(clearance) => clearance,
            PipelineDecision::Terminate(response) => return PipelineDecision::Terminate(response),
        };

        if let Some(payload) = self.clean(&request.payload) {
            request.payload = payload;
        }
        if let Some(uri) = self.clean_query(&request.parts.uri) {
            request.parts.uri = uri;
        }

        PipelineDecision::Continue(Admitted { request, clearance })
    }

    /// Terminal response for a rejection raised after screening.
    pub fn reject_response(&self, rejection: Rejection, clearance: &Clearance) -> TerminalResponse {
        metrics::record_rejection(rejection.reason());
        let mut response = TerminalResponse::from_rejection(&rejection);
        clearance.apply_to(&mut response.headers);
        response
    }

    fn reject<T>(&self, rejection: Rejection, clearance: &Clearance) -> PipelineDecision<T> {
        PipelineDecision::Terminate(self.reject_response(rejection, clearance))
    }

    fn sanitize_value(&self, source: &'static str, value: &Value) -> Option<Value> {
        let report = self.sanitizer.sanitize_with_report(value);
        if report.is_clean() {
            return None;
        }
        report_stripped(source, &report.stripped);
        Some(report.value)
    }

    /// Drop every pair that carries an operator key anywhere in its bracket
    /// path. The pairs left over are returned exactly as they were sent.
    fn sanitize_pairs(&self, source: &'static str, input: &[u8]) -> Option<Vec<u8>> {
        let mut kept = Vec::new();
        let mut stripped = Vec::new();
        for pair in query::raw_pairs(input) {
            let report = self.sanitizer.sanitize_with_report(&query::parse_nested(pair));
            if report.is_clean() {
                kept.push(pair);
            } else {
                stripped.extend(report.stripped);
            }
        }
        if stripped.is_empty() {
            return None;
        }
        report_stripped(source, &stripped);
        Some(kept.join(&b'&'))
    }
}

fn report_stripped(source: &'static str, stripped: &[String]) {
    tracing::warn!(source, ?stripped, "Blocked query operator keys");
    metrics::record_stripped_keys(source, stripped.len());
}

fn replace_query(uri: &Uri, query: &str) -> Option<Uri> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}
