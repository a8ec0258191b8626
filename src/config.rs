// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! The API key and the token store secret are required. Everything else
//! falls back to defaults suitable for a local backend.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    /// Backend base URL, without a trailing slash
    pub api_base_url: String,
    /// Static shared secret sent as `X-API-Key` on every request
    pub api_key: String,
    /// Location of the encrypted token file
    pub token_store_path: PathBuf,
    /// Master secret the token encryption key is derived from (raw bytes)
    pub store_secret: Vec<u8>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .field("token_store_path", &self.token_store_path)
            .field("store_secret", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TOKEN_STORE_PATH: &str = ".cgm/tokens.json";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("CGM_API_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let api_key = env::var("CGM_API_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("CGM_API_KEY"))?;
        if api_key.is_empty() {
            return Err(ConfigError::Invalid {
                var: "CGM_API_KEY",
                reason: "must not be empty".to_string(),
            });
        }

        let store_secret = env::var("CGM_STORE_SECRET")
            .map_err(|_| ConfigError::Missing("CGM_STORE_SECRET"))?
            .into_bytes();
        if store_secret.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "CGM_STORE_SECRET",
                reason: "must be at least 16 bytes".to_string(),
            });
        }

        Ok(Self {
            api_base_url,
            api_key,
            token_store_path: env::var("CGM_TOKEN_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_STORE_PATH)),
            store_secret,
            connect_timeout: Duration::from_secs(secs_var(
                "CGM_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?),
            request_timeout: Duration::from_secs(secs_var(
                "CGM_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        })
    }

    /// Fixed config for tests.
    pub fn test_default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            api_key: "test_api_key".to_string(),
            token_store_path: PathBuf::from("target/test-tokens.json"),
            store_secret: b"test_store_secret_32_bytes_long!".to_vec(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Parse an optional whole-seconds variable.
fn secs_var(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("expected whole seconds, got {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
