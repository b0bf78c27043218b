//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Refuse policies that would silently admit everything (empty allowlist,
//!   zero windows or ceilings)
//! - Check that configured methods and header names are valid HTTP tokens
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: IngressConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::{HeaderName, Method};
use thiserror::Error;

use crate::config::schema::{IngressConfig, WindowConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &IngressConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_cors(config, &mut errors);
    if config.rate_limit.enabled {
        validate_window("rate_limit.general", &config.rate_limit.general, &mut errors);
        validate_window("rate_limit.sensitive", &config.rate_limit.sensitive, &mut errors);
        if config.rate_limit.sweep_interval_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.sweep_interval_secs",
                "must be greater than zero",
            ));
        }
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_body_bytes",
            "must be greater than zero",
        ));
    }
    for (i, endpoint) in config.limits.endpoints.iter().enumerate() {
        if !endpoint.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("limits.endpoints[{}].path_prefix", i),
                "must start with '/'",
            ));
        }
        if endpoint.max_body_bytes == 0 {
            errors.push(ValidationError::new(
                format!("limits.endpoints[{}].max_body_bytes", i),
                "must be greater than zero",
            ));
        }
    }

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_cors(config: &IngressConfig, errors: &mut Vec<ValidationError>) {
    let cors = &config.cors;

    if cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "at least one origin must be configured",
        ));
    }
    for origin in &cors.allowed_origins {
        if origin == "*" {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                "wildcard is not allowed; list exact origins",
            ));
        } else if url::Url::parse(origin).is_err() || origin.ends_with('/') {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not a bare origin (scheme://host[:port])", origin),
            ));
        }
    }

    for method in &cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("'{}' is not a valid method", method),
            ));
        }
    }
    for header in &cors.allowed_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_headers",
                format!("'{}' is not a valid header name", header),
            ));
        }
    }
}

fn validate_window(field: &str, window: &WindowConfig, errors: &mut Vec<ValidationError>) {
    if window.window_secs == 0 {
        errors.push(ValidationError::new(
            format!("{}.window_secs", field),
            "must be greater than zero",
        ));
    }
    if window.max_requests == 0 {
        errors.push(ValidationError::new(
            format!("{}.max_requests", field),
            "must be greater than zero",
        ));
    }
}
