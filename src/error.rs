// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error types.

use crate::config::ConfigError;
use http::StatusCode;

/// Longest server error message kept in an [`AppError::Api`].
const MAX_MESSAGE_LEN: usize = 200;

/// Error type for every client operation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    /// The backend still answered 401 after the pipeline gave up on refresh.
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Map a non-success response to an error.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return AppError::SessionExpired;
        }

        AppError::Api {
            status: status.as_u16(),
            message: error_message(body),
        }
    }

    /// Whether the caller should send the user back to login.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::SessionExpired)
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::SessionExpired => Some(StatusCode::UNAUTHORIZED.as_u16()),
            AppError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull a readable message out of an error body.
///
/// Understands `{"detail": ...}`, `{"message": ...}` and `{"error": ...}`;
/// anything else is returned as text.
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for field in ["detail", "message", "error"] {
            if let Some(msg) = value.get(field).and_then(|v| v.as_str()) {
                return truncate(msg);
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "no details".to_string()
    } else {
        truncate(text)
    }
}

fn truncate(msg: &str) -> String {
    msg.chars().take(MAX_MESSAGE_LEN).collect()
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_session_expired() {
        let err = AppError::from_status(StatusCode::UNAUTHORIZED, b"");
        assert!(err.is_session_expired());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_forbidden_is_surfaced_as_api_error() {
        let err = AppError::from_status(StatusCode::FORBIDDEN, br#"{"detail":"Clinicians only"}"#);
        assert!(!err.is_session_expired());
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Clinicians only");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_body_is_truncated() {
        let body = "x".repeat(500);
        let err = AppError::from_status(StatusCode::INTERNAL_SERVER_ERROR, body.as_bytes());
        match err {
            AppError::Api { message, .. } => assert_eq!(message.len(), MAX_MESSAGE_LEN),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_body() {
        let err = AppError::from_status(StatusCode::NOT_FOUND, b"  ");
        assert_eq!(err.to_string(), "API error (HTTP 404): no details");
    }
}
