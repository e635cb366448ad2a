//! Health check endpoint
//!
//! Always answers 200 while the process is up. The `database` field comes
//! from a fresh round trip to the store, which also updates the flag the
//! feature endpoints check before querying.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::routes::json_response;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: String,
    /// "connected" or "disconnected"
    pub database: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// GET /health
pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let database = if state.store.refresh_connectivity().await {
        "connected"
    } else {
        "disconnected"
    };

    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok".to_string(),
            database: database.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    )
}
