//! Error types shared across the gateway

use hyper::StatusCode;
use thiserror::Error;

/// Gateway-wide error type
///
/// Every variant maps to a distinct, caller-actionable HTTP outcome via
/// [`GatewayError::status`] and a stable machine code via
/// [`GatewayError::code`]. No variant is fatal to the process.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Backing store not configured (dev mode without MongoDB)
    #[error("database not configured")]
    StoreUnavailable,

    /// Store-level failure (connection, query, serialization)
    #[error("database error: {0}")]
    Database(String),

    /// Referenced document does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed or out-of-range request data
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Withdrawal exceeds the user's available balance
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Payment gateway call or verification failed
    #[error("payment error: {0}")]
    Payment(String),

    /// Generative assistant upstream failure
    #[error("assistant error: {0}")]
    Assistant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// Serialization failures surface as store errors: they only occur while
// building documents or API payloads from stored data.
impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Database(format!("Serialization failed: {}", e))
    }
}

impl From<bson::ser::Error> for GatewayError {
    fn from(e: bson::ser::Error) -> Self {
        GatewayError::Database(format!("Serialization failed: {}", e))
    }
}

impl GatewayError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GatewayError::InsufficientBalance => StatusCode::BAD_REQUEST,
            GatewayError::Payment(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Assistant(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::StoreUnavailable => "DB_NOT_CONFIGURED",
            GatewayError::Database(_) => "DB_ERROR",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::InvalidArgument(_) => "INVALID_ARGUMENT",
            GatewayError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            GatewayError::Payment(_) => "PAYMENT_ERROR",
            GatewayError::Assistant(_) => "ASSISTANT_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::NotFound("project").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::InsufficientBalance.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::StoreUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_serialization_errors_map_to_database() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = GatewayError::from(json_err);
        assert!(matches!(err, GatewayError::Database(_)));
        assert_eq!(err.code(), "DB_ERROR");

        let bson_err =
            bson::to_bson(&std::collections::HashMap::from([((1, 2), 3)])).unwrap_err();
        let err = GatewayError::from(bson_err);
        assert!(matches!(err, GatewayError::Database(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_code_stability() {
        assert_eq!(GatewayError::StoreUnavailable.code(), "DB_NOT_CONFIGURED");
        assert_eq!(
            GatewayError::InvalidArgument("bad".into()).code(),
            "INVALID_ARGUMENT"
        );
    }
}
