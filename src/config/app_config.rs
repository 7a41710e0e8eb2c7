//! Application configuration structures
//!
//! This module contains the main configuration structures for the application.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use validator::Validate;

/// Payment gateway query API configuration.
///
/// Passed explicitly into the gateway client so tests and multi-account
/// deployments can run several clients side by side.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API, e.g. `https://api.gateway.example/v1`
    #[validate(url)]
    pub base_url: String,

    /// API key id (basic auth user)
    #[validate(length(min = 1))]
    pub key_id: String,

    /// API key secret (basic auth password)
    #[validate(length(min = 1))]
    pub key_secret: String,

    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 120))]
    pub timeout_seconds: u64,

    /// Currency assumed when a gateway entity omits one
    #[validate(length(equal = 3))]
    pub default_currency: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.gateway.example/v1".to_string(),
            key_id: "key_id".to_string(),
            key_secret: "key_secret".to_string(),
            timeout_seconds: 10,
            default_currency: "INR".to_string(),
        }
    }
}

/// Inbound webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookConfig {
    /// Shared secret used by the gateway to sign webhook bodies
    #[validate(length(min = 8))]
    pub secret: String,

    /// Header carrying the hex HMAC signature
    #[validate(length(min = 1))]
    pub signature_header: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-webhook-secret".to_string(),
            signature_header: "x-gateway-signature".to_string(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server address to bind to
    pub bind_address: IpAddr,

    /// Server port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Maximum request size in bytes
    #[validate(range(min = 1024, max = 10485760))] // 1KB to 10MB
    pub max_request_size: usize,
}

/// JWT configuration for the reconciliation query endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    /// JWT secret key
    #[validate(length(min = 32))]
    pub secret_key: String,

    /// JWT issuer
    #[validate(length(min = 1))]
    pub issuer: String,

    /// JWT audience
    #[validate(length(min = 1))]
    pub audience: String,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityConfig {
    #[validate(nested)]
    pub jwt: JwtConfig,
}

/// Storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Redis connection URL, used when `backend = "redis"`
    #[validate(url)]
    pub redis_url: String,

    /// Key prefix for everything this service stores in Redis
    #[validate(length(min = 1))]
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "reconciler".to_string(),
        }
    }
}

/// Reconciliation tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReconciliationConfig {
    /// Reload-and-remerge attempts after a version conflict
    #[validate(range(min = 1, max = 50))]
    pub max_conflict_retries: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self { max_conflict_retries: 5 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[validate(length(min = 1))]
    pub level: String,

    /// `json` or `text`
    #[validate(length(min = 1))]
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub reconciliation: ReconciliationConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: IpAddr::from([127, 0, 0, 1]),
                port: 8080,
                max_request_size: 256 * 1024,
            },
            gateway: GatewayConfig::default(),
            webhook: WebhookConfig::default(),
            security: SecurityConfig {
                jwt: JwtConfig {
                    secret_key: "your-super-secret-jwt-key-that-should-be-32-chars-min".to_string(),
                    issuer: "storefront".to_string(),
                    audience: "settlement-reconciler".to_string(),
                },
            },
            storage: StorageConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> crate::Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to build defaults: {}", e)))?;

        let config = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("Conf").required(false))
            .add_source(config::Environment::with_prefix("RECONCILER").separator("__"))
            .build()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config.try_deserialize()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate_config()
            .map_err(|e| crate::shared::error::AppError::Validation(format!("Configuration validation failed: {}", e)))?;
        super::ConfigValidator::validate_config(&config)?;

        Ok(config)
    }

    /// Validate every section
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.gateway.validate()?;
        self.webhook.validate()?;
        self.security.validate()?;
        self.storage.validate()?;
        self.reconciliation.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
