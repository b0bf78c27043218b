//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → middleware/ingress.rs (pipeline screen, bounded buffering, sanitize)
//!     → handlers.rs or caller routes (business logic)
//!     → clearance headers applied to the response
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::{ClientIdentity, X_REQUEST_ID};
pub use server::HttpServer;
