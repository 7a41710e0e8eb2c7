//! Authentication adapter for token validation
//!
//! Internal callers of the reconciliation endpoint present an HS256 JWT
//! issued by the storefront.

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::JwtConfig;
use crate::shared::error::{AppError, AppResult};

/// JWT claims structure for validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Calling service
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

/// Adapter for authentication services
pub struct AuthenticationAdapter {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl AuthenticationAdapter {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());
        Self { config, decoding_key }
    }

    /// Validate an `Authorization` header value of the form `Bearer <jwt>`
    pub fn validate_bearer(&self, header: Option<&str>) -> AppResult<JwtClaims> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Authentication("Invalid token format".to_string()))?;

        self.validate_jwt_token(token)
    }

    fn validate_jwt_token(&self, token: &str) -> AppResult<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);

        let claims = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                warn!(error = %e, "JWT validation failed");
                AppError::Authentication(format!("JWT validation failed: {}", e))
            })?
            .claims;

        if claims.iat > Utc::now().timestamp() as usize + 60 {
            return Err(AppError::Authentication("Token issued in the future".to_string()));
        }

        debug!(subject = %claims.sub, "JWT validated");
        Ok(claims)
    }
}
