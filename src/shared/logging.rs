//! Logging utilities module
//!
//! This module provides centralized logging functionality and utilities.

use tracing::{error, info, warn};

/// Logging utilities for the application
pub struct LoggingUtils;

impl LoggingUtils {
    /// Initialize logging with the specified level and format
    pub fn initialize(level: &str, format: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));

        let builder = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let result = if format.eq_ignore_ascii_case("json") {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };

        result.map_err(|e| crate::shared::error::AppError::Internal(format!("Failed to initialize logging: {}", e)))
    }

    /// Log an inbound webhook after classification
    pub fn log_webhook(request_id: &str, kind: &str, outcome: &str) {
        info!(
            request_id = %request_id,
            kind = %kind,
            outcome = %outcome,
            "Webhook handled"
        );
    }

    /// Log a failed request
    pub fn log_error(request_id: &str, operation: &str, error: &crate::shared::error::AppError) {
        error!(
            request_id = %request_id,
            operation = %operation,
            error = %error,
            retryable = error.is_retryable(),
            "Request failed"
        );
    }

    /// Log security events
    pub fn log_security_event(event_type: &str, details: &str) {
        warn!(
            event_type = %event_type,
            details = %details,
            "Security event detected"
        );
    }

    /// Generate a unique request ID
    pub fn generate_request_id() -> String {
        format!("req_{}", uuid::Uuid::new_v4().simple())
    }
}
