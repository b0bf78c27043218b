//! Axum middleware that runs the ingress pipeline in front of every route.
//!
//! Header-only stages decide first. The body is buffered only for requests
//! that survive them, bounded by the route's ceiling, so a lying or absent
//! `Content-Length` cannot push more than the limit into memory.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{self, Body},
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::Rejection;
use crate::http::request::ClientIdentity;
use crate::pipeline::{IngressPipeline, Payload, PipelineDecision, RequestHead};

pub async fn ingress_middleware(
    State(pipeline): State<Arc<IngressPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let client = ClientIdentity::from_parts(&parts, pipeline.trusts_proxy());

    let clearance = match pipeline.screen(&RequestHead::new(&parts, &client), Instant::now()) {
        PipelineDecision::Continue(clearance) => clearance,
        PipelineDecision::Terminate(response) => return response.into_response(),
    };

    let limit = pipeline.body_limit(parts.uri.path());
    let bytes = match body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                client = %client,
                path = %parts.uri.path(),
                limit,
                error = %e,
                "Request body exceeded limit while buffering"
            );
            let rejection = Rejection::PayloadTooLarge {
                limit,
                declared: None,
            };
            return pipeline.reject_response(rejection, &clearance).into_response();
        }
    };

    let payload = match Payload::parse(parts.headers.get(header::CONTENT_TYPE), bytes.clone()) {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(client = %client, path = %parts.uri.path(), "Malformed JSON body");
            return pipeline.reject_response(rejection, &clearance).into_response();
        }
    };

    let bytes = match pipeline.clean(&payload) {
        Some(cleaned) => {
            let bytes = cleaned.into_bytes();
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            bytes
        }
        None => bytes,
    };
    if let Some(uri) = pipeline.clean_query(&parts.uri) {
        parts.uri = uri;
    }

    parts.extensions.insert(client);
    let mut response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    clearance.apply_to(response.headers_mut());
    response
}
