// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token middleware with one-shot refresh on 401.

use crate::error::{AppError, Result};
use crate::store::TokenStore;
use crate::{HttpRequest, HttpResponse};
use futures_util::future::BoxFuture;
use http::header::{HeaderValue, AUTHORIZATION};
use http::StatusCode;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// Path fragments that never carry a bearer token.
///
/// Matched by substring, so any path containing one of these is public.
pub const PUBLIC_ENDPOINTS: &[&str] = &[
    "/api/v1/healthz",
    "/api/v1/auth/register/patient",
    "/api/v1/auth/register/clinician",
    "/api/v1/auth/login",
    "/api/v1/auth/refresh",
];

/// Whether `path` is exempt from bearer authentication.
pub fn is_public_endpoint(path: &str) -> bool {
    PUBLIC_ENDPOINTS.iter().any(|p| path.contains(p))
}

/// Exchanges the refresh token after the backend rejected an access token.
pub trait TokenRefresher: Send + Sync {
    /// Returns true once the store holds an access token newer than
    /// `rejected_access_token`. Never fails; errors count as false.
    fn refresh<'a>(&'a self, rejected_access_token: &'a str) -> BoxFuture<'a, bool>;
}

/// Layer producing [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer {
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl AuthLayer {
    pub fn new(tokens: Arc<TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { tokens, refresher }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            tokens: self.tokens.clone(),
            refresher: self.refresher.clone(),
        }
    }
}

/// Attaches the session bearer token and retries once after a refresh.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl<S> Service<HttpRequest> for AuthService<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = AppError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = HttpResponse;
    type Error = AppError;
    type Future = BoxFuture<'static, Result<HttpResponse>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: HttpRequest) -> Self::Future {
        // Keep the service that was polled ready for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let tokens = self.tokens.clone();
        let refresher = self.refresher.clone();

        Box::pin(async move {
            let path = request.uri().path().to_string();
            if is_public_endpoint(&path) {
                return inner.call(request).await;
            }

            let Some(access_token) = tokens.access_token() else {
                // Nothing to refresh; let the backend answer as it will.
                return inner.call(request).await;
            };

            let retry = copy_request(&request);
            let mut request = request;
            set_bearer(&mut request, &access_token)?;

            let response = inner.call(request).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            tracing::info!(path = %path, "Access token rejected, refreshing");
            if !refresher.refresh(&access_token).await {
                tracing::warn!(path = %path, "Refresh failed, returning original response");
                return Ok(response);
            }

            let Some(refreshed) = tokens.access_token() else {
                return Ok(response);
            };
            drop(response);

            let mut retry = retry;
            set_bearer(&mut retry, &refreshed)?;
            tracing::debug!(path = %path, "Retrying with refreshed access token");
            inner.ready().await?.call(retry).await
        })
    }
}

/// Set the single `Authorization` header.
fn set_bearer(request: &mut HttpRequest, access_token: &str) -> Result<()> {
    let mut value = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Access token is not a valid header")))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Copy of a request as it arrived, for the one retry.
fn copy_request(request: &HttpRequest) -> HttpRequest {
    let mut copy = http::Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
