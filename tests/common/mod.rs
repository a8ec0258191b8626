// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use cgm_client::error::AppError;
use cgm_client::middleware::TokenRefresher;
use cgm_client::models::TokenSet;
use cgm_client::store::TokenStore;
use cgm_client::{HttpRequest, HttpResponse};
use futures_util::future::BoxFuture;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Token store pre-loaded with a session.
#[allow(dead_code)]
pub fn store_with(access: &str, refresh: &str) -> Arc<TokenStore> {
    let store = TokenStore::in_memory();
    store
        .save(&TokenSet::new(access, refresh, "Bearer"))
        .expect("save tokens");
    Arc::new(store)
}

/// What the fake backend saw for one request.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Vec<String>,
    pub api_key: Option<String>,
    pub body: Vec<u8>,
}

/// Fake backend answering with a scripted list of statuses and recording
/// every request it receives.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FakeBackend {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    statuses: Arc<Mutex<VecDeque<StatusCode>>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn replying(statuses: &[StatusCode]) -> Self {
        Self {
            seen: Arc::default(),
            statuses: Arc::new(Mutex::new(statuses.iter().copied().collect())),
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Handle one request; 200 once the script runs out.
    pub async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, AppError> {
        let header_strings = |name: &str| -> Vec<String> {
            request
                .headers()
                .get_all(name)
                .iter()
                .map(|v| v.to_str().unwrap().to_string())
                .collect()
        };

        self.seen.lock().unwrap().push(SeenRequest {
            path: request.uri().path().to_string(),
            authorization: header_strings("authorization"),
            api_key: header_strings("x-api-key").into_iter().next(),
            body: request.body().clone(),
        });

        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StatusCode::OK);

        let mut response = HttpResponse::new(format!("{{\"status\":{}}}", status.as_u16()).into_bytes());
        *response.status_mut() = status;
        Ok(response)
    }
}

/// Refresher with a fixed outcome that counts its calls.
///
/// On success it stores `new_access_token`; on failure it clears the store,
/// like the real coordinator.
#[allow(dead_code)]
pub struct FakeRefresher {
    pub tokens: Arc<TokenStore>,
    pub succeed: bool,
    pub new_access_token: String,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeRefresher {
    pub fn new(tokens: Arc<TokenStore>, succeed: bool, new_access_token: &str) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            succeed,
            new_access_token: new_access_token.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for FakeRefresher {
    fn refresh<'a>(&'a self, _rejected_access_token: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                self.tokens
                    .update_access_token(&self.new_access_token)
                    .unwrap();
            } else {
                self.tokens.clear().unwrap();
            }
            self.succeed
        })
    }
}

/// GET request for `path` with an empty body.
#[allow(dead_code)]
pub fn get(path: &str) -> HttpRequest {
    http::Request::builder()
        .uri(path)
        .body(Vec::new())
        .unwrap()
}
