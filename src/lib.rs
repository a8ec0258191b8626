// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! CGM client: authenticated access to a continuous glucose monitoring backend
//!
//! This crate provides the request pipeline (API key, bearer token with
//! refresh-and-retry), encrypted session storage, and typed calls for
//! uploading CGM exports and reading server-side analyses.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

pub use services::ApiClient;
pub use store::TokenStore;

/// Outbound request as it travels through the pipeline.
pub type HttpRequest = http::Request<Vec<u8>>;

/// Fully buffered response.
pub type HttpResponse = http::Response<Vec<u8>>;
