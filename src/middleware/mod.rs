// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request pipeline middleware (API key, bearer authentication).

pub mod api_key;
pub mod auth;

pub use api_key::{api_key_layer, API_KEY_HEADER};
pub use auth::{is_public_endpoint, AuthLayer, AuthService, TokenRefresher, PUBLIC_ENDPOINTS};
