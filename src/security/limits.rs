//! Request size limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size from the declared `Content-Length`
//! - Resolve per-endpoint overrides of the ceiling
//!
//! # Design Decisions
//! - Limits checked before any body is read (early rejection)
//! - Longest matching path prefix wins
//! - Return 413 Payload Too Large

use crate::config::{EndpointLimit, LimitsConfig};
use crate::error::Rejection;
use crate::pipeline::RequestHead;

/// Size guard stage of the pipeline.
#[derive(Debug, Clone)]
pub struct SizeGuard {
    default_limit: usize,
    /// Sorted longest prefix first.
    endpoints: Vec<EndpointLimit>,
}

impl SizeGuard {
    pub fn new(default_limit: usize, mut endpoints: Vec<EndpointLimit>) -> Self {
        endpoints.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        Self {
            default_limit,
            endpoints,
        }
    }

    pub fn from_config(config: &LimitsConfig) -> Self {
        Self::new(config.max_body_bytes, config.endpoints.clone())
    }

    /// Ceiling in bytes for a request to `path`.
    pub fn limit_for(&self, path: &str) -> usize {
        self.endpoints
            .iter()
            .find(|e| path.starts_with(&e.path_prefix))
            .map(|e| e.max_body_bytes)
            .unwrap_or(self.default_limit)
    }

    pub fn check(&self, head: &RequestHead<'_>) -> Result<(), Rejection> {
        let Some(declared) = head.declared_len() else {
            return Ok(());
        };

        let limit = self.limit_for(head.path());
        if declared > limit as u64 {
            tracing::warn!(
                client = %head.client(),
                path = head.path(),
                declared,
                limit,
                "Request body exceeds limit"
            );
            return Err(Rejection::PayloadTooLarge {
                limit,
                declared: Some(declared),
            });
        }
        Ok(())
    }
}
