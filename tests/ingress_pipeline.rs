//! Router-level tests: the full middleware stack driven with `oneshot`.

mod common;

use axum::body::Body;
use axum::http::{header, StatusCode};
use serde_json::json;

use common::{json_request, request, router, send, test_config, FRONTEND};
use ingress_guard::config::Environment;

#[tokio::test]
async fn test_health_carries_hardening_headers_and_request_id() {
    let app = router(test_config());
    let res = send(&app, request("GET", "/api/health", "10.0.0.1").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["timestamp"].is_string());
    assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(res.headers[header::X_FRAME_OPTIONS], "DENY");
    assert!(res.headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_fingerprint_headers_removed_from_handler_response() {
    let app = router(test_config());
    let res = send(&app, request("GET", "/api/legacy", "10.0.0.1").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.headers.get("x-powered-by").is_none());
    assert!(res.headers.get(header::SERVER).is_none());
}

#[tokio::test]
async fn test_handler_vary_keeps_origin_appended() {
    let app = router(test_config());
    let req = request("GET", "/api/negotiated", "10.0.0.1")
        .header(header::ORIGIN, FRONTEND)
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::VARY], "Accept-Encoding, Origin");
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
}

#[tokio::test]
async fn test_production_adds_hsts() {
    let mut config = test_config();
    config.environment = Environment::Production;
    let app = router(config);
    let res = send(&app, request("GET", "/api/health", "10.0.0.1").body(Body::empty()).unwrap()).await;

    assert_eq!(
        res.headers[header::STRICT_TRANSPORT_SECURITY],
        "max-age=31536000; includeSubDomains"
    );
}

#[tokio::test]
async fn test_unknown_route_gets_json_404_with_headers() {
    let app = router(test_config());
    let res = send(&app, request("GET", "/api/nothing", "10.0.0.1").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["code"], "NOT_FOUND");
    assert_eq!(res.headers[header::X_FRAME_OPTIONS], "DENY");
}

// ---------------------------------------------------------------------------
// Size guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_declared_size_over_ceiling_rejected() {
    let app = router(test_config());
    let body = "x".repeat(257);
    let req = request("POST", "/api/listings", "10.0.0.1")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(res.body["limit"], 256);
    assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_size_at_ceiling_admitted() {
    let app = router(test_config());
    let body = format!("\"{}\"", "x".repeat(254));
    assert_eq!(body.len(), 256);
    let res = send(&app, json_request("POST", "/api/listings", "10.0.0.1", &body)).await;

    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_undeclared_oversized_body_rejected_while_buffering() {
    let app = router(test_config());
    let req = request("POST", "/api/listings", "10.0.0.1")
        .body(Body::from("y".repeat(1_000)))
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_endpoint_override_raises_ceiling() {
    let app = router(test_config());
    let body = "z".repeat(2_000);
    let req = request("POST", "/api/uploads", "10.0.0.1")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_allowed_origin_echoed_with_credentials() {
    let app = router(test_config());
    let req = request("GET", "/api/listings", "10.0.0.1")
        .header(header::ORIGIN, FRONTEND)
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(res.headers[header::VARY], "Origin");
}

#[tokio::test]
async fn test_unlisted_origin_forbidden_with_diagnostics() {
    let app = router(test_config());
    let req = request("GET", "/api/listings", "10.0.0.1")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "ORIGIN_NOT_ALLOWED");
    assert_eq!(res.body["origin"], "https://evil.example");
    assert!(res.body["requestId"].is_string());
    assert_eq!(
        res.body["allowedOrigins"],
        json!([FRONTEND, "http://localhost:5173"])
    );
    assert!(res.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(res.headers[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn test_production_hides_allowlist() {
    let mut config = test_config();
    config.environment = Environment::Production;
    let app = router(config);
    let req = request("GET", "/api/listings", "10.0.0.1")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.body.get("allowedOrigins").is_none());
}

#[tokio::test]
async fn test_preflight_answered_without_reaching_handler() {
    let app = router(test_config());
    let req = request("OPTIONS", "/api/auth/login", "10.0.0.1")
        .header(header::ORIGIN, FRONTEND)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(
        res.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(res.headers[header::ACCESS_CONTROL_MAX_AGE], "600");
    assert!(res.headers.contains_key("x-request-id"));

    // Preflights never consume the sensitive quota.
    for _ in 0..2 {
        let res = send(&app, json_request("POST", "/api/auth/login", "10.0.0.1", "{}")).await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_preflight_from_unlisted_origin_forbidden() {
    let app = router(test_config());
    let req = request("OPTIONS", "/api/listings", "10.0.0.1")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Rate limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_general_limit_per_client() {
    let app = router(test_config());

    for remaining in ["2", "1", "0"] {
        let res = send(&app, request("GET", "/api/listings", "10.0.0.1").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.headers["ratelimit-limit"], "3");
        assert_eq!(res.headers["ratelimit-remaining"], remaining);
    }

    let res = send(&app, request("GET", "/api/listings", "10.0.0.1").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["code"], "RATE_LIMITED");
    let retry: u64 = res.headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=10).contains(&retry));
    assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    // Another client has its own window.
    let res = send(&app, request("GET", "/api/listings", "10.0.0.2").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_sensitive_limit_is_independent_and_stricter() {
    let app = router(test_config());

    for _ in 0..2 {
        let res = send(&app, json_request("POST", "/api/auth/login", "10.0.0.3", "{}")).await;
        assert_eq!(res.status, StatusCode::OK);
    }
    let res = send(&app, json_request("POST", "/api/auth/login", "10.0.0.3", "{}")).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    // CORS headers are present so the browser can read the 429.
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);

    // The blocked login passed the general tier first, so that window is full too.
    let res = send(&app, request("GET", "/api/listings", "10.0.0.3").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);

    // Listings for a fresh client are unaffected by 10.0.0.3's login attempts.
    let res = send(&app, request("GET", "/api/listings", "10.0.0.30").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_for_ignored_unless_trusted() {
    let app = router(test_config());
    for i in 0..4 {
        let req = request("GET", "/api/listings", "10.0.0.4")
            .header("x-forwarded-for", format!("203.0.113.{i}"))
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        let expected = if i < 3 { StatusCode::OK } else { StatusCode::TOO_MANY_REQUESTS };
        assert_eq!(res.status, expected);
    }

    let mut config = test_config();
    config.trust_proxy = Some(true);
    let app = router(config);
    let req = request("GET", "/api/listings", "10.0.0.4")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.4")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.body["client"], "203.0.113.9");
}

#[tokio::test]
async fn test_rate_limiting_can_be_disabled() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    let app = router(config);

    for _ in 0..5 {
        let res = send(&app, request("GET", "/api/listings", "10.0.0.5").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.headers.get("ratelimit-limit").is_none());
    }
}

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_operator_keys_stripped_from_json_body() {
    let app = router(test_config());
    let body = r#"{"email":{"$ne":null},"password":{"$gt":""},"remember":true}"#;
    let res = send(&app, json_request("POST", "/api/auth/login", "10.0.0.6", body)).await;

    assert_eq!(res.status, StatusCode::OK);
    let expected = json!({"email": {}, "password": {}, "remember": true});
    assert_eq!(res.body["body"], expected);
    assert_eq!(
        res.body["contentLength"],
        expected.to_string().len().to_string()
    );
}

#[tokio::test]
async fn test_clean_body_passes_untouched() {
    let app = router(test_config());
    let body = r#"{"title":"Quiet room","price":850,"tags":["pets","parking"]}"#;
    let res = send(&app, json_request("POST", "/api/listings", "10.0.0.6", body)).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body["body"],
        json!({"title": "Quiet room", "price": 850, "tags": ["pets", "parking"]})
    );
    assert_eq!(res.body["contentLength"], body.len().to_string());
}

#[tokio::test]
async fn test_nested_operator_in_query_stripped() {
    let app = router(test_config());
    let req = request("GET", "/api/listings?price%5B%24gt%5D=0&city=Riverside", "10.0.0.7")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["query"], "city=Riverside");
}

#[tokio::test]
async fn test_repeated_query_keys_survive_stripping() {
    let app = router(test_config());
    let req = request("GET", "/api/listings?tag=a&tag=b&price%5B%24gt%5D=0", "10.0.0.7")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["query"], "tag=a&tag=b");
}

#[tokio::test]
async fn test_form_body_sanitized() {
    let app = router(test_config());
    let body = "email=a%40b.c&password[$ne]=x";
    let req = request("POST", "/api/auth/login", "10.0.0.8")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["body"], "email=a%40b.c");
}

#[tokio::test]
async fn test_non_utf8_form_body_sanitized() {
    let app = router(test_config());
    let body: &'static [u8] = b"note=%FF\xff&password[$ne]=x";
    let req = request("POST", "/api/auth/login", "10.0.0.8")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["body"], "note=%FF\u{fffd}");
    assert_eq!(res.body["contentLength"], "9");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let app = router(test_config());
    let res = send(&app, json_request("POST", "/api/listings", "10.0.0.9", "{\"title\":")).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Invalid JSON format");
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
}
