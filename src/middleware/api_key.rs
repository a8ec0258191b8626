// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static API key header, applied to every request.

use crate::config::ConfigError;
use crate::error::{AppError, Result};
use http::header::{HeaderName, HeaderValue};
use tower_http::set_header::SetRequestHeaderLayer;

/// Header carrying the shared client secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Layer that sets `X-API-Key` on every request, replacing any existing value.
pub fn api_key_layer(api_key: &str) -> Result<SetRequestHeaderLayer<HeaderValue>> {
    let mut value = HeaderValue::from_str(api_key).map_err(|_| {
        AppError::Config(ConfigError::Invalid {
            var: "CGM_API_KEY",
            reason: "not a valid header value".to_string(),
        })
    })?;
    value.set_sensitive(true);

    Ok(SetRequestHeaderLayer::overriding(
        HeaderName::from_static(API_KEY_HEADER),
        value,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpRequest, HttpResponse};
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    #[tokio::test]
    async fn test_api_key_added_and_overrides() {
        let svc = ServiceBuilder::new()
            .layer(api_key_layer("k-123").unwrap())
            .service(service_fn(|req: HttpRequest| async move {
                let keys: Vec<_> = req.headers().get_all(API_KEY_HEADER).iter().collect();
                assert_eq!(keys.len(), 1);
                assert_eq!(keys[0], "k-123");
                Ok::<_, AppError>(HttpResponse::new(Vec::new()))
            }));

        let request = http::Request::builder()
            .uri("/api/v1/healthz")
            .header("x-api-key", "spoofed")
            .body(Vec::new())
            .unwrap();

        svc.oneshot(request).await.unwrap();
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(api_key_layer("bad\nkey").is_err());
    }
}
