// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - transport, token refresh and the API client.

pub mod api;
pub mod refresh;
pub mod transport;

pub use api::{ApiClient, Pipeline};
pub use refresh::{RefreshCoordinator, REFRESH_PATH};
pub use transport::HttpTransport;
