//! Stage outcomes: continue with response headers, or terminate.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::error::{retry_after_secs, Rejection};
use crate::security::rate_limit::RateDecision;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Result of running one or more pipeline stages.
#[derive(Debug)]
pub enum PipelineDecision<T> {
    /// Traversal continues with `T`.
    Continue(T),
    /// Traversal stops; send this response verbatim.
    Terminate(TerminalResponse),
}

impl<T> PipelineDecision<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineDecision::Terminate(_))
    }

    pub fn into_continue(self) -> Option<T> {
        match self {
            PipelineDecision::Continue(value) => Some(value),
            PipelineDecision::Terminate(_) => None,
        }
    }

    pub fn into_terminal(self) -> Option<TerminalResponse> {
        match self {
            PipelineDecision::Continue(_) => None,
            PipelineDecision::Terminate(response) => Some(response),
        }
    }
}

/// A response fully owned by the pipeline.
#[derive(Debug, Clone)]
pub struct TerminalResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl TerminalResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn from_rejection(rejection: &Rejection) -> Self {
        let mut headers = HeaderMap::new();
        if let Rejection::RateLimited {
            limit, retry_after, ..
        } = rejection
        {
            let secs = retry_after_secs(*retry_after);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
            headers.insert(RATELIMIT_LIMIT, HeaderValue::from(*limit));
            headers.insert(RATELIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(RATELIMIT_RESET, HeaderValue::from(secs));
        }

        Self {
            status: rejection.status(),
            headers,
            body: Some(rejection.body()),
        }
    }
}

impl IntoResponse for TerminalResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => Json(body).into_response(),
            None => Response::new(Body::empty()),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Headers the admitted request's eventual response must carry.
///
/// Collected by the hardening, CORS and rate-limit stages and applied once
/// the business handler has produced its response.
#[derive(Debug, Clone, Default)]
pub struct Clearance {
    headers: HeaderMap,
    strip: Vec<HeaderName>,
}

impl Clearance {
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn extend(&mut self, headers: HeaderMap) {
        self.headers.extend(headers);
    }

    /// Remove `name` from the response, whoever set it.
    pub fn strip(&mut self, name: HeaderName) {
        if !self.strip.contains(&name) {
            self.strip.push(name);
        }
    }

    /// Advertise the remaining quota of an admitted request.
    pub fn record_quota(&mut self, decision: RateDecision) {
        if let RateDecision::Admitted {
            limit,
            remaining,
            reset_after,
        } = decision
        {
            self.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
            self.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
            self.insert(RATELIMIT_RESET, HeaderValue::from(retry_after_secs(reset_after)));
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Write the recorded headers over `target`. `Vary` is merged with what
    /// the handler already declared instead of replacing it.
    pub fn apply_to(&self, target: &mut HeaderMap) {
        for name in &self.strip {
            target.remove(name);
        }
        for (name, value) in &self.headers {
            if *name == header::VARY {
                merge_vary(target, value);
            } else {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

fn merge_vary(target: &mut HeaderMap, value: &HeaderValue) {
    let existing: Vec<String> = target
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect();
    if existing.is_empty() {
        target.insert(header::VARY, value.clone());
        return;
    }

    let Ok(added) = value.to_str() else {
        target.append(header::VARY, value.clone());
        return;
    };
    // `*` already varies on everything.
    if existing
        .iter()
        .any(|token| token == "*" || token.eq_ignore_ascii_case(added))
    {
        return;
    }
    match HeaderValue::from_str(&format!("{}, {}", existing.join(", "), added)) {
        Ok(merged) => {
            target.insert(header::VARY, merged);
        }
        Err(_) => {
            target.append(header::VARY, value.clone());
        }
    }
}
