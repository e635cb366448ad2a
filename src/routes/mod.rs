//! HTTP routes for featuremap

pub mod features;
pub mod health;
pub mod static_files;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

pub use features::{handle_all, handle_batch, handle_count, BatchQuery, BatchResponse, CountResponse};
pub use health::{health_check, HealthResponse};
pub use static_files::{handle_static, static_asset};

/// Error body shared by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    message: impl Into<String>,
    attempts: Option<u32>,
) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            message: message.into(),
            attempts,
        },
    )
}

/// 503 for requests arriving while the store is disconnected
pub(crate) fn database_unavailable_response() -> Response<Full<Bytes>> {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Database not connected",
        "The feature store is not reachable, try again shortly",
        None,
    )
}

/// Generic 500; the underlying message is only exposed in development mode
pub(crate) fn internal_error_response(message: &str, dev_mode: bool) -> Response<Full<Bytes>> {
    let message = if dev_mode {
        message.to_string()
    } else {
        "Something went wrong".to_string()
    };
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
        message,
        None,
    )
}
