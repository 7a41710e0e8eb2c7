//! Configuration validation module
//!
//! Cross-field checks beyond what the validator derive expresses.

use crate::config::app_config::{AppConfig, GatewayConfig, StorageBackend};
use crate::shared::error::AppError;

/// Configuration validator for additional validation logic
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the complete configuration
    pub fn validate_config(config: &AppConfig) -> crate::Result<()> {
        Self::validate_gateway(&config.gateway)?;
        Self::validate_secrets(config)?;
        Self::validate_storage(config)?;
        Ok(())
    }

    /// Gateway credentials travel in every request, so remote gateways must use HTTPS
    fn validate_gateway(gateway: &GatewayConfig) -> crate::Result<()> {
        let url = gateway.base_url.as_str();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "Gateway base URL must start with http:// or https://".to_string()
            ));
        }

        let local = url.contains("localhost") || url.contains("127.0.0.1");
        if !local && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "Remote gateway base URL must use HTTPS".to_string()
            ));
        }

        if !gateway.default_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::Validation(format!(
                "Invalid default currency: {}",
                gateway.default_currency
            )));
        }

        Ok(())
    }

    fn validate_secrets(config: &AppConfig) -> crate::Result<()> {
        if config.webhook.secret == config.security.jwt.secret_key {
            return Err(AppError::Validation(
                "Webhook secret and JWT secret must differ".to_string()
            ));
        }

        if config.webhook.secret == super::app_config::WebhookConfig::default().secret {
            tracing::warn!("Webhook secret is the built-in default - set RECONCILER__WEBHOOK__SECRET");
        }

        Ok(())
    }

    fn validate_storage(config: &AppConfig) -> crate::Result<()> {
        if config.storage.backend == StorageBackend::Redis && !config.storage.redis_url.starts_with("redis") {
            return Err(AppError::Validation(
                "Redis storage selected but redis_url is not a redis:// or rediss:// URL".to_string()
            ));
        }
        if config.storage.backend == StorageBackend::Memory {
            tracing::warn!("Using in-memory storage - payment state will not survive a restart");
        }
        Ok(())
    }
}
