//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::IngressConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file (if given), apply process environment overrides, validate.
pub fn load_config(path: Option<&Path>) -> Result<IngressConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => IngressConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment-style settings onto `config`.
///
/// `lookup` resolves a variable name to its value; injecting it keeps this
/// testable without touching the process environment.
pub fn apply_env_overrides<F>(config: &mut IngressConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("APP_ENV") {
        config.environment = parse_var("APP_ENV", &value)?;
    }
    if let Some(value) = lookup("BIND_ADDRESS") {
        config.listener.bind_address = value;
    }
    if let Some(value) = lookup("ALLOWED_ORIGINS") {
        config.cors.allowed_origins = split_list(&value);
    }
    if let Some(value) = lookup("FRONTEND_URL") {
        let value = value.trim().to_string();
        if !value.is_empty() && !config.cors.allowed_origins.contains(&value) {
            config.cors.allowed_origins.push(value);
        }
    }
    if let Some(value) = lookup("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.general.window_secs = parse_var("RATE_LIMIT_WINDOW_SECS", &value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_MAX") {
        config.rate_limit.general.max_requests = parse_var("RATE_LIMIT_MAX", &value)?;
    }
    if let Some(value) = lookup("AUTH_RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.sensitive.window_secs =
            parse_var("AUTH_RATE_LIMIT_WINDOW_SECS", &value)?;
    }
    if let Some(value) = lookup("AUTH_RATE_LIMIT_MAX") {
        config.rate_limit.sensitive.max_requests = parse_var("AUTH_RATE_LIMIT_MAX", &value)?;
    }
    if let Some(value) = lookup("MAX_BODY_BYTES") {
        config.limits.max_body_bytes = parse_var("MAX_BODY_BYTES", &value)?;
    }
    if let Some(value) = lookup("TRUST_PROXY") {
        config.trust_proxy = Some(parse_bool("TRUST_PROXY", &value)?);
    }
    if let Some(value) = lookup("LOG_LEVEL") {
        config.observability.log_level = value;
    }
    Ok(())
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
