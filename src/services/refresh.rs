// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token refresh.
//!
//! Handles:
//! - Exchanging the stored refresh token for a new access token
//! - Persisting the new access token
//! - Clearing the whole session when the exchange fails
//! - Collapsing concurrent refreshes into one network call

use crate::error::{AppError, Result};
use crate::middleware::TokenRefresher;
use crate::models::{RefreshRequest, RefreshResponse};
use crate::store::TokenStore;
use crate::{HttpRequest, HttpResponse};
use futures_util::future::BoxFuture;
use http::header::CONTENT_TYPE;
use http::Method;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::{Service, ServiceExt};

/// Refresh endpoint path.
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Single-flight refresh of the session access token.
///
/// `transport` must not include the auth middleware; the refresh call is a
/// public endpoint and must never recurse into another refresh.
pub struct RefreshCoordinator<S> {
    transport: S,
    tokens: Arc<TokenStore>,
    /// Serializes refresh attempts across requests.
    refresh_lock: Mutex<()>,
}

impl<S> RefreshCoordinator<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = AppError> + Clone + Send + Sync,
    S::Future: Send,
{
    pub fn new(transport: S, tokens: Arc<TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Refresh after the backend rejected `rejected_access_token`.
    ///
    /// Returns true when the store holds a newer access token, whether this
    /// call fetched it or a concurrent one did. On failure the session is
    /// cleared.
    pub async fn refresh_access_token(&self, rejected_access_token: &str) -> bool {
        // Only one task refreshes; the rest wait here and reuse its result.
        let _guard = self.refresh_lock.lock().await;

        let current = self.tokens.get();
        match current {
            Some(tokens) if tokens.access_token != rejected_access_token => {
                tracing::debug!("Access token already refreshed by a concurrent request");
                !tokens.access_token.is_empty()
            }
            Some(tokens) if !tokens.refresh_token.is_empty() => {
                match self.try_refresh(&tokens.refresh_token).await {
                    Ok(()) => {
                        tracing::info!("Access token refreshed");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Token refresh failed, ending session");
                        self.end_session();
                        false
                    }
                }
            }
            _ => {
                tracing::info!("No refresh token stored, ending session");
                self.end_session();
                false
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<()> {
        let body = serde_json::to_vec(&RefreshRequest { refresh_token })
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode refresh request: {}", e)))?;

        let request = http::Request::builder()
            .method(Method::POST)
            .uri(REFRESH_PATH)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build refresh request: {}", e)))?;

        let response = self.transport.clone().oneshot(request).await?;
        if !response.status().is_success() {
            return Err(AppError::from_status(response.status(), response.body()));
        }

        let refreshed: RefreshResponse = serde_json::from_slice(response.body())
            .map_err(|e| AppError::Decode(format!("Refresh response: {}", e)))?;
        if refreshed.access_token.is_empty() {
            return Err(AppError::Decode("Refresh response has an empty access token".to_string()));
        }

        self.tokens.update_access_token(&refreshed.access_token)
    }

    fn end_session(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "Failed to clear session tokens");
        }
    }
}

impl<S> TokenRefresher for RefreshCoordinator<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = AppError> + Clone + Send + Sync,
    S::Future: Send,
{
    fn refresh<'a>(&'a self, rejected_access_token: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(self.refresh_access_token(rejected_access_token))
    }
}
