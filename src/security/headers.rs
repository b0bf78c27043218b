//! Security response headers.
//!
//! # Responsibilities
//! - Add `X-Content-Type-Options: nosniff` and `X-Frame-Options: DENY`
//! - Strip headers that fingerprint the server stack
//! - Add HSTS in production deployments
//!
//! # Design Decisions
//! - Stateless and never short-circuits
//! - Applied to terminal responses as well as handler responses

use axum::http::{header, HeaderName, HeaderValue};

use crate::config::{Environment, HeadersConfig};
use crate::pipeline::Clearance;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Hardening stage of the pipeline.
#[derive(Debug, Clone)]
pub struct HeaderHardener {
    set: Vec<(HeaderName, HeaderValue)>,
    strip: Vec<HeaderName>,
}

impl HeaderHardener {
    pub fn new(environment: Environment, config: &HeadersConfig) -> Self {
        let mut set = vec![
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        ];
        if environment.is_production() {
            let hsts = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);
            if let Ok(value) = HeaderValue::from_str(&hsts) {
                set.push((header::STRICT_TRANSPORT_SECURITY, value));
            }
        }

        Self {
            set,
            strip: vec![X_POWERED_BY, header::SERVER],
        }
    }

    /// Record the hardening headers on `clearance`.
    pub fn apply(&self, clearance: &mut Clearance) {
        for name in &self.strip {
            clearance.strip(name.clone());
        }
        for (name, value) in &self.set {
            clearance.insert(name.clone(), value.clone());
        }
    }
}
