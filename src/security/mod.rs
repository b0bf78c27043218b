//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (declared body size vs. ceiling)
//!     → headers.rs (nosniff, frame denial, HSTS, strip fingerprints)
//!     → cors.rs (origin allowlist, preflight short-circuit)
//!     → rate_limit.rs (per-client sliding windows, general + sensitive)
//!     → sanitize.rs (strip operator keys from body and query)
//!     → Pass to business handler
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod cors;
pub mod headers;
pub mod limits;
pub mod query;
pub mod rate_limit;
pub mod sanitize;

pub use cors::{CorsGate, CorsOutcome, OriginPolicy};
pub use headers::HeaderHardener;
pub use limits::SizeGuard;
pub use rate_limit::{
    RateDecision, RateLimiter, RateWindowStore, RouteClass, TieredRateLimiter, WindowPolicy,
};
pub use sanitize::{PayloadSanitizer, SanitizationPolicy, Sanitized};
