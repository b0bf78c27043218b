//! Request-side helpers.
//!
//! # Responsibilities
//! - Derive the client identity that keys rate-limit state
//! - Read the request ID assigned by the request-id layer
//!
//! # Design Decisions
//! - `X-Forwarded-For` is only honoured when the deployment trusts a proxy;
//!   otherwise any client could pick its own identity
//! - A missing peer address degrades to a shared "unknown" identity instead
//!   of failing the request

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap, HeaderName};

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Key under which a client's rate-limit windows are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Resolve the identity of the caller behind `parts`.
    pub fn from_parts(parts: &Parts, trust_proxy: bool) -> Self {
        if trust_proxy {
            if let Some(ip) = forwarded_client(&parts.headers) {
                return Self(ip.to_string());
            }
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self(addr.ip().to_string()))
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(value: IpAddr) -> Self {
        Self(value.to_string())
    }
}

/// Left-most address of `X-Forwarded-For`, i.e. the original client.
fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Request ID set by the outer request-id layer, if any.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder, peer: Option<&str>) -> Parts {
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            parts.extensions.insert(ConnectInfo(addr));
        }
        parts
    }

    #[test]
    fn test_identity_from_peer_address() {
        let p = parts(Request::builder(), Some("203.0.113.7:51234"));
        assert_eq!(ClientIdentity::from_parts(&p, false).as_str(), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_ignored_without_trust() {
        let p = parts(
            Request::builder().header("x-forwarded-for", "198.51.100.1"),
            Some("10.0.0.2:4000"),
        );
        assert_eq!(ClientIdentity::from_parts(&p, false).as_str(), "10.0.0.2");
    }

    #[test]
    fn test_forwarded_for_used_with_trust() {
        let p = parts(
            Request::builder().header("x-forwarded-for", "198.51.100.1, 10.0.0.1"),
            Some("10.0.0.2:4000"),
        );
        assert_eq!(ClientIdentity::from_parts(&p, true).as_str(), "198.51.100.1");
    }

    #[test]
    fn test_garbage_forwarded_for_falls_back_to_peer() {
        let p = parts(
            Request::builder().header("x-forwarded-for", "not-an-ip"),
            Some("10.0.0.2:4000"),
        );
        assert_eq!(ClientIdentity::from_parts(&p, true).as_str(), "10.0.0.2");
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        let p = parts(Request::builder(), None);
        assert_eq!(ClientIdentity::from_parts(&p, true), ClientIdentity::unknown());
    }
}
