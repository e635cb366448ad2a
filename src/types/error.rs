//! Error types for featuremap

use hyper::StatusCode;

/// Main error type for featuremap operations
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The document store is not connected. Never retried.
    #[error("Database not connected")]
    DatabaseUnavailable,

    /// A query failed (timeout, network, server error). Eligible for retry.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored document could not be decoded. Deterministic, so never retried.
    #[error("Malformed document: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MapError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidGeoJson(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a retry policy should try the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<std::io::Error> for MapError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidGeoJson(format!("JSON error: {}", err))
    }
}

impl MapError {
    /// Classify a driver error, prefixing the message with what was being done
    pub fn from_driver(context: &str, err: mongodb::error::Error) -> Self {
        match *err.kind {
            mongodb::error::ErrorKind::BsonDeserialization(_) => {
                Self::Decode(format!("{}: {}", context, err))
            }
            _ => Self::Database(format!("{}: {}", context, err)),
        }
    }
}

impl From<mongodb::error::Error> for MapError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            mongodb::error::ErrorKind::BsonDeserialization(_) => Self::Decode(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<bson::de::Error> for MapError {
    fn from(err: bson::de::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for featuremap operations
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            MapError::DatabaseUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            MapError::Database("timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            MapError::NotFound("/nope".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_only_query_failures_are_retryable() {
        assert!(MapError::Database("connection reset".into()).is_retryable());
        assert!(!MapError::DatabaseUnavailable.is_retryable());
        assert!(!MapError::Internal("boom".into()).is_retryable());
        assert!(!MapError::Decode("bad _id".into()).is_retryable());
    }

    #[test]
    fn test_driver_errors_are_classified() {
        let transient = mongodb::error::Error::custom("connection reset by peer");
        assert!(MapError::from(transient).is_retryable());

        let decode_err = <bson::de::Error as serde::de::Error>::custom("expecting DateTime");
        let decode = mongodb::error::Error::from(decode_err);
        let mapped = MapError::from_driver("Cursor read failed", decode);
        assert!(matches!(mapped, MapError::Decode(ref msg) if msg.starts_with("Cursor read failed")));
        assert!(!mapped.is_retryable());
        assert_eq!(mapped.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
