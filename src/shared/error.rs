//! Error handling module
//!
//! This module provides centralized error handling for the application.

use thiserror::Error;
use serde_json::Value;

/// Application error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Webhook signature is invalid")]
    SignatureInvalid,

    #[error("Facts reference a payment foreign to this order")]
    ForeignPayment,

    #[error("Malformed facts: {0}")]
    MalformedFacts(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment gateway rejected credentials: {0}")]
    GatewayUnauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::SignatureInvalid => "signature_invalid",
            AppError::ForeignPayment => "foreign_payment",
            AppError::MalformedFacts(_) => "malformed_facts",
            AppError::GatewayUnavailable(_) => "gateway_unavailable",
            AppError::GatewayUnauthorized(_) => "gateway_unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Storage(_) => "storage_error",
            AppError::Json(_) => "invalid_json",
            AppError::Validation(_) => "validation_error",
            AppError::Authentication(_) => "authentication_failed",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Convert to a JSON error body
    pub fn to_json(&self) -> Value {
        // Operator-facing details of gateway credential problems stay in the logs
        let message = match self {
            AppError::GatewayUnauthorized(_) => "Payment gateway configuration error".to_string(),
            AppError::Storage(_) | AppError::Internal(_) | AppError::Config(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        serde_json::json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        })
    }

    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;

        match self {
            AppError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedFacts(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ForeignPayment => StatusCode::CONFLICT,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::GatewayUnauthorized(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a caller may retry the same operation later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::GatewayUnavailable(_) | AppError::Storage(_) | AppError::Conflict(_)
        )
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

// Implement warp::reject::Reject for AppError
impl warp::reject::Reject for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Storage(format!("redis: {}", err))
    }
}
