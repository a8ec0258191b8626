// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wire and session models.

pub mod dataset;
pub mod tokens;
pub mod user;

pub use dataset::{Analysis, Dataset, HealthResponse};
pub use tokens::{
    token_preview, RefreshRequest, RefreshResponse, TokenResponse, TokenSet, DEFAULT_TOKEN_TYPE,
};
pub use user::{LoginRequest, RegisterClinicianRequest, RegisterPatientRequest, UserProfile};
