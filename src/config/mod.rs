//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: APP_ENV, ALLOWED_ORIGINS, ...)
//!     → validation.rs (semantic checks)
//!     → IngressConfig (validated, immutable)
//!     → resolved once into policy objects owned by the pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A config that would leave a policy empty or ineffective is fatal

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AbsentOrigin, CorsConfig, EndpointLimit, Environment, HeadersConfig, IngressConfig,
    LimitsConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig, SanitizeConfig,
    WindowConfig,
};
