//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the ingress
//! pipeline. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IngressConfig {
    /// Deployment mode; controls HSTS and diagnostic output.
    pub environment: Environment,

    /// Trust `X-Forwarded-For` for client identity.
    /// Unset means "trust unless running in development".
    pub trust_proxy: Option<bool>,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin allowlist and CORS response settings.
    pub cors: CorsConfig,

    /// Sliding-window rate limits.
    pub rate_limit: RateLimitConfig,

    /// Request size ceilings.
    pub limits: LimitsConfig,

    /// Payload sanitization settings.
    pub sanitize: SanitizeConfig,

    /// Response hardening settings.
    pub headers: HeadersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl IngressConfig {
    /// Effective proxy trust after applying the per-environment default.
    pub fn trusts_proxy(&self) -> bool {
        self.trust_proxy
            .unwrap_or(self.environment != Environment::Development)
    }
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

/// What to do with requests that carry no `Origin` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsentOrigin {
    /// Answer with `Access-Control-Allow-Origin: *`.
    Wildcard,
    /// Treat as a same-service / non-browser caller; no allow-origin header.
    #[default]
    Trusted,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact-match allowed origins.
    pub allowed_origins: Vec<String>,

    /// Behaviour for requests without an `Origin` header.
    pub absent_origin: AbsentOrigin,

    /// Methods advertised in `Access-Control-Allow-Methods`.
    pub allowed_methods: Vec<String>,

    /// Headers advertised in `Access-Control-Allow-Headers`.
    pub allowed_headers: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds (0 disables the header).
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            absent_origin: AbsentOrigin::Trusted,
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: [
                "Origin",
                "X-Requested-With",
                "Content-Type",
                "Accept",
                "Authorization",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            allow_credentials: true,
            max_age_secs: 600,
        }
    }
}

/// Parameters of one sliding window.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct WindowConfig {
    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum admitted requests per window.
    pub max_requests: u32,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Limit applied to every route.
    pub general: WindowConfig,

    /// Stricter limit for credential submission and similar routes.
    pub sensitive: WindowConfig,

    /// Path prefixes that fall under the sensitive class.
    pub sensitive_paths: Vec<String>,

    /// Interval of the background sweep that drops idle clients.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            general: WindowConfig {
                window_secs: 15 * 60,
                max_requests: 100,
            },
            sensitive: WindowConfig {
                window_secs: 15 * 60,
                max_requests: 5,
            },
            sensitive_paths: vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
            ],
            sweep_interval_secs: 60,
        }
    }
}

/// Per-path body ceiling override.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointLimit {
    pub path_prefix: String,
    pub max_body_bytes: usize,
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Default maximum body size in bytes.
    pub max_body_bytes: usize,

    /// Smaller (or larger) ceilings for specific endpoints.
    pub endpoints: Vec<EndpointLimit>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            endpoints: Vec::new(),
        }
    }
}

/// Sanitization configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Keys denylisted in addition to the built-in operator list.
    pub extra_keys: Vec<String>,

    /// Denylist every key beginning with this prefix (e.g. "$").
    pub reserved_prefix: Option<String>,
}

/// Response hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// HSTS max-age in seconds, sent only in production.
    pub hsts_max_age_secs: u64,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            hsts_max_age_secs: 31_536_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
