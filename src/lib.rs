//! Request ingress security pipeline for the housing API.
//!
//! Every inbound request passes, in order, a body-size guard, response
//! header hardening, a CORS origin gate, tiered sliding-window rate limits
//! and a payload sanitizer before any business handler runs.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::{load_config, ConfigError, IngressConfig};
pub use error::Rejection;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::IngressPipeline;
