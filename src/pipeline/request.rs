//! Views of an inbound request as seen by the pipeline stages.

use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Method};
use serde_json::Value;

use crate::error::Rejection;
use crate::http::request::{self, ClientIdentity};

/// Everything the header-only stages need: no body access.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    parts: &'a Parts,
    client: &'a ClientIdentity,
}

impl<'a> RequestHead<'a> {
    pub fn new(parts: &'a Parts, client: &'a ClientIdentity) -> Self {
        Self { parts, client }
    }

    pub fn method(&self) -> &'a Method {
        &self.parts.method
    }

    pub fn path(&self) -> &'a str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &'a HeaderMap {
        &self.parts.headers
    }

    pub fn client(&self) -> &'a ClientIdentity {
        self.client
    }

    pub fn request_id(&self) -> Option<&'a str> {
        request::request_id(&self.parts.headers)
    }

    /// Body size announced by `Content-Length`, if present and numeric.
    pub fn declared_len(&self) -> Option<u64> {
        self.parts
            .headers
            .get(header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

/// A buffered request body, decoded where the content type allows it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded`, kept as sent. Screened pair by
    /// pair with bracket notation, whatever its encoding.
    Form(Bytes),
    /// Anything else; passed through untouched.
    Raw(Bytes),
}

impl Payload {
    pub fn parse(content_type: Option<&HeaderValue>, bytes: Bytes) -> Result<Self, Rejection> {
        if bytes.is_empty() {
            return Ok(Payload::Empty);
        }

        let mime = content_type
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == "application/json" || mime.ends_with("+json") {
            return serde_json::from_slice(&bytes)
                .map(Payload::Json)
                .map_err(|_| Rejection::MalformedJson);
        }
        if mime == "application/x-www-form-urlencoded" {
            return Ok(Payload::Form(bytes));
        }
        Ok(Payload::Raw(bytes))
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Empty => Bytes::new(),
            Payload::Json(value) => Bytes::from(value.to_string()),
            Payload::Form(bytes) | Payload::Raw(bytes) => bytes,
        }
    }
}

/// A fully buffered request, ready for a complete pipeline traversal.
#[derive(Debug)]
pub struct IngressRequest {
    pub parts: Parts,
    pub client: ClientIdentity,
    pub payload: Payload,
}

impl IngressRequest {
    pub fn new(parts: Parts, client: ClientIdentity, payload: Payload) -> Self {
        Self {
            parts,
            client,
            payload,
        }
    }

    pub fn head(&self) -> RequestHead<'_> {
        RequestHead::new(&self.parts, &self.client)
    }
}
