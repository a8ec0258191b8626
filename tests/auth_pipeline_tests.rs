// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request pipeline tests.
//!
//! These tests verify that:
//! 1. Public endpoints never carry a bearer token
//! 2. Protected endpoints carry exactly the stored token
//! 3. A 401 triggers at most one refresh and one retry
//! 4. The API key is present on every request, retries included

use cgm_client::middleware::{api_key_layer, AuthLayer, PUBLIC_ENDPOINTS};
use cgm_client::store::TokenStore;
use http::StatusCode;
use std::sync::Arc;
use tower::{service_fn, ServiceBuilder, ServiceExt};

mod common;
use common::{get, store_with, FakeBackend, FakeRefresher};

/// Build `api key -> auth -> fake backend`.
macro_rules! pipeline {
    ($backend:expr, $tokens:expr, $refresher:expr) => {{
        let backend = $backend.clone();
        ServiceBuilder::new()
            .layer(api_key_layer("test-key").unwrap())
            .layer(AuthLayer::new($tokens.clone(), $refresher.clone()))
            .service(service_fn(move |req| {
                let backend = backend.clone();
                async move { backend.handle(req).await }
            }))
    }};
}

#[tokio::test]
async fn test_public_endpoints_never_get_bearer() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[StatusCode::UNAUTHORIZED; 5]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    for path in PUBLIC_ENDPOINTS {
        let response = pipeline!(backend, tokens, refresher)
            .oneshot(get(path))
            .await
            .unwrap();
        // 401 on a public endpoint is returned as-is
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let seen = backend.seen();
    assert_eq!(seen.len(), PUBLIC_ENDPOINTS.len());
    assert!(seen.iter().all(|r| r.authorization.is_empty()));
    assert!(seen.iter().all(|r| r.api_key.as_deref() == Some("test-key")));
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_protected_endpoint_carries_stored_token() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(get("/api/v1/datasets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let seen = backend.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization, vec!["Bearer A1".to_string()]);
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn test_401_refresh_success_retries_once_with_new_token() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[StatusCode::UNAUTHORIZED, StatusCode::OK]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(get("/api/v1/datasets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(refresher.calls(), 1);

    let seen = backend.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].authorization, vec!["Bearer A1".to_string()]);
    assert_eq!(seen[1].authorization, vec!["Bearer A2".to_string()]);
    assert_eq!(seen[1].api_key.as_deref(), Some("test-key"));
}

#[tokio::test]
async fn test_retry_failure_is_final() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(get("/api/v1/datasets"))
        .await
        .unwrap();

    // The retry's own 401 comes back verbatim; no second refresh.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresher.calls(), 1);
    assert_eq!(backend.seen().len(), 2);
}

#[tokio::test]
async fn test_refresh_failure_returns_original_401() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[StatusCode::UNAUTHORIZED]);
    let refresher = FakeRefresher::new(tokens.clone(), false, "unused");

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(get("/api/v1/datasets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.body(), br#"{"status":401}"#);
    assert_eq!(refresher.calls(), 1);
    assert_eq!(backend.seen().len(), 1);
    assert_eq!(tokens.get(), None);
}

#[tokio::test]
async fn test_anonymous_request_skips_refresh() {
    let tokens = Arc::new(TokenStore::in_memory());
    let backend = FakeBackend::replying(&[StatusCode::UNAUTHORIZED]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(get("/api/v1/datasets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresher.calls(), 0);
    let seen = backend.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].authorization.is_empty());
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[StatusCode::FORBIDDEN]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(get("/api/v1/datasets/42/analysis"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(refresher.calls(), 0);
    assert_eq!(backend.seen().len(), 1);
    assert_eq!(tokens.current().unwrap().access_token, "A1");
}

#[tokio::test]
async fn test_retry_keeps_request_body() {
    let tokens = store_with("A1", "R1");
    let backend = FakeBackend::replying(&[StatusCode::UNAUTHORIZED, StatusCode::CREATED]);
    let refresher = FakeRefresher::new(tokens.clone(), true, "A2");

    let request = http::Request::builder()
        .method("POST")
        .uri("/api/v1/datasets?name=week1")
        .body(b"time,glucose\n2024-01-01T00:00:00,105\n".to_vec())
        .unwrap();

    let response = pipeline!(backend, tokens, refresher)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let seen = backend.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].body, seen[1].body);
    assert!(!seen[1].body.is_empty());
}
