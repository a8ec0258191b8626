// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CGM backend API client.
//!
//! Builds the request pipeline
//! (`X-API-Key` → bearer auth with refresh → network) and exposes typed
//! calls for the backend endpoints.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::{api_key_layer, AuthLayer, AuthService};
use crate::models::{
    Analysis, Dataset, HealthResponse, LoginRequest, RegisterClinicianRequest,
    RegisterPatientRequest, TokenResponse, TokenSet, UserProfile,
};
use crate::services::{HttpTransport, RefreshCoordinator};
use crate::store::{EncryptedFileStore, TokenStore};
use crate::{HttpRequest, HttpResponse};
use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::set_header::SetRequestHeader;
use validator::Validate;

/// The full outbound pipeline.
pub type Pipeline = SetRequestHeader<AuthService<HttpTransport>, HeaderValue>;

const JSON: &str = "application/json";
const CSV: &str = "text/csv";

/// Typed client for the CGM backend.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Pipeline,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    /// Build a client around an existing token store.
    pub fn new(config: &Config, tokens: Arc<TokenStore>) -> Result<Self> {
        let transport = HttpTransport::new(
            &config.api_base_url,
            config.connect_timeout,
            config.request_timeout,
        )?;
        let transport_base = transport.base_url().to_string();
        let api_key = api_key_layer(&config.api_key)?;

        let refresher = Arc::new(RefreshCoordinator::new(
            ServiceBuilder::new()
                .layer(api_key.clone())
                .service(transport.clone()),
            tokens.clone(),
        ));

        let pipeline = ServiceBuilder::new()
            .layer(api_key)
            .layer(AuthLayer::new(tokens.clone(), refresher))
            .service(transport);

        tracing::debug!(base_url = %transport_base, "API client ready");
        Ok(Self { pipeline, tokens })
    }

    /// Build a client whose tokens live in the encrypted file store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = EncryptedFileStore::open(&config.token_store_path, &config.store_secret)?;
        tracing::debug!(path = %backend.path().display(), "Using encrypted token store");
        let tokens = Arc::new(TokenStore::new(Arc::new(backend)));
        Self::new(config, tokens)
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Send a raw request through the pipeline. Non-2xx responses are
    /// returned, not converted to errors.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.pipeline.clone().oneshot(request).await
    }

    // ─── Health & Accounts ───────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/api/v1/healthz").await
    }

    pub async fn register_patient(&self, request: &RegisterPatientRequest) -> Result<UserProfile> {
        validate(request)?;
        self.post_json("/api/v1/auth/register/patient", request).await
    }

    pub async fn register_clinician(
        &self,
        request: &RegisterClinicianRequest,
    ) -> Result<UserProfile> {
        validate(request)?;
        self.post_json("/api/v1/auth/register/clinician", request).await
    }

    /// Log in and persist the returned session.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenSet> {
        validate(request)?;
        let response: TokenResponse = self
            .post_json("/api/v1/auth/login", request)
            .await
            .map_err(|e| match e {
                // No session is involved yet; 401 here means bad credentials.
                AppError::SessionExpired => AppError::Api {
                    status: 401,
                    message: "invalid email or password".to_string(),
                },
                other => other,
            })?;
        let tokens = TokenSet::from(response);
        if !tokens.is_valid() {
            return Err(AppError::Decode(
                "Login response is missing a token".to_string(),
            ));
        }

        self.tokens.save(&tokens)?;
        tracing::info!("Logged in, session stored");
        Ok(tokens)
    }

    /// Tell the backend (best effort) and drop the local session.
    pub async fn logout(&self) -> Result<()> {
        if self.tokens.is_authenticated() {
            match self
                .execute(Method::POST, "/api/v1/auth/logout", None, Vec::new())
                .await
            {
                Ok(_) => tracing::debug!("Backend acknowledged logout"),
                Err(e) => tracing::warn!(error = %e, "Backend logout failed, clearing locally"),
            }
        }

        self.tokens.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub async fn me(&self) -> Result<UserProfile> {
        self.get_json("/api/v1/users/me").await
    }

    /// Delete the account; the local session is cleared once the backend
    /// confirms.
    pub async fn delete_account(&self) -> Result<()> {
        self.execute(Method::DELETE, "/api/v1/users/me", None, Vec::new())
            .await?;
        self.tokens.clear()?;
        tracing::info!("Account deleted, session cleared");
        Ok(())
    }

    // ─── Datasets ────────────────────────────────────────────────────────────

    /// Upload a CGM CSV export.
    pub async fn upload_dataset(&self, name: &str, csv: Vec<u8>) -> Result<Dataset> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("dataset name is required".to_string()));
        }
        if csv.is_empty() {
            return Err(AppError::Validation("CSV file is empty".to_string()));
        }

        let path = format!("/api/v1/datasets?name={}", urlencoding::encode(name));
        let response = self.execute(Method::POST, &path, Some(CSV), csv).await?;
        let dataset: Dataset = decode(&response)?;
        tracing::info!(dataset_id = %dataset.id, "Dataset uploaded");
        Ok(dataset)
    }

    pub async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        self.get_json("/api/v1/datasets").await
    }

    /// Fetch the server-computed analysis for a dataset.
    pub async fn analysis(&self, dataset_id: &str) -> Result<Analysis> {
        let path = format!(
            "/api/v1/datasets/{}/analysis",
            urlencoding::encode(dataset_id)
        );
        let payload: serde_json::Value = self.get_json(&path).await?;
        Ok(Analysis {
            dataset_id: dataset_id.to_string(),
            payload,
        })
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute(Method::GET, path, None, Vec::new()).await?;
        decode(&response)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_vec(body)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode request: {}", e)))?;
        let response = self.execute(Method::POST, path, Some(JSON), body).await?;
        decode(&response)
    }

    /// Send a request and turn non-2xx responses into errors.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header(ACCEPT, JSON);
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(body)
            .map_err(|e| AppError::Validation(format!("Invalid request for {}: {}", path, e)))?;

        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), path, "Request failed");
            return Err(AppError::from_status(status, response.body()));
        }
        Ok(response)
    }
}

fn validate<T: Validate>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(response.body()).map_err(|e| AppError::Decode(e.to_string()))
}
