// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glucose dataset models.

use serde::{Deserialize, Serialize};

/// An uploaded CGM export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    /// Upload time (ISO 8601)
    pub uploaded_at: Option<String>,
    /// Number of glucose readings the server parsed
    pub reading_count: Option<u64>,
}

/// Server-computed analysis of a dataset.
///
/// The payload (patterns, extrema, risk scores) is produced and versioned by
/// the backend, so it is kept as raw JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub dataset_id: String,
    pub payload: serde_json::Value,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
