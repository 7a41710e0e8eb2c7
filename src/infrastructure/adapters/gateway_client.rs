//! HTTP client for the payment gateway's query API
//!
//! This adapter only translates between the gateway's wire shapes and the
//! domain types. It holds no state beyond its configuration and connection pool.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::domain::money::from_minor_units;
use crate::domain::payments::{Payment, PaymentStatus, Refund, RefundStatus, Settlement, SettlementStatus};
use crate::domain::ports::{GatewayError, GatewayResult, PaymentGateway};
use crate::shared::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct WirePayment {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    captured: bool,
    fee: Option<i64>,
    created_at: i64,
    error_reason: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTransfer {
    id: String,
    source: String,
    amount: i64,
    currency: Option<String>,
    status: Option<String>,
    processed_at: Option<i64>,
    recipient: Option<String>,
    recipient_settlement_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRefund {
    id: String,
    payment_id: String,
    amount: i64,
    currency: Option<String>,
    status: String,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireList<T> {
    Envelope { items: Vec<T> },
    Bare(Vec<T>),
}

impl<T> WireList<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            WireList::Envelope { items } => items,
            WireList::Bare(items) => items,
        }
    }
}

fn unix(secs: i64) -> GatewayResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| GatewayError::Protocol(format!("invalid timestamp {}", secs)))
}

impl WirePayment {
    fn into_domain(self) -> GatewayResult<Payment> {
        let status = match self.status.as_str() {
            // Refunds are tracked separately; the money was captured
            "refunded" => PaymentStatus::Captured,
            other => other.parse().map_err(GatewayError::Protocol)?,
        };
        Ok(Payment {
            amount: from_minor_units(self.amount, &self.currency),
            fee: self.fee.map(|fee| from_minor_units(fee, &self.currency)),
            created_at: unix(self.created_at)?,
            failure_reason: self.error_reason.or(self.error_description),
            captured: self.captured,
            status,
            currency: self.currency.to_ascii_uppercase(),
            id: self.id,
        })
    }
}

impl WireTransfer {
    fn into_domain(self, fallback_currency: &str) -> GatewayResult<Settlement> {
        let status = match self.status.as_deref() {
            Some(status) => status.parse().map_err(GatewayError::Protocol)?,
            None if self.processed_at.is_some() => SettlementStatus::Transferred,
            None => SettlementStatus::Pending,
        };
        let transferred_at = match (status, self.processed_at) {
            (SettlementStatus::Transferred, Some(secs)) => Some(unix(secs)?),
            _ => None,
        };
        let currency = self.currency.as_deref().unwrap_or(fallback_currency);
        Ok(Settlement {
            transfer_id: self.id,
            source_payment_id: self.source,
            status,
            transferred_at,
            amount_transferred: from_minor_units(self.amount, currency),
            recipient: self.recipient,
            settlement_id: self.recipient_settlement_id,
        })
    }
}

impl WireRefund {
    fn into_domain(self, fallback_currency: &str) -> GatewayResult<Refund> {
        let currency = self.currency.as_deref().unwrap_or(fallback_currency);
        Ok(Refund {
            amount: from_minor_units(self.amount, currency),
            status: self.status.parse::<RefundStatus>().map_err(GatewayError::Protocol)?,
            created_at: unix(self.created_at)?,
            payment_id: self.payment_id,
            id: self.id,
        })
    }
}

/// Map an HTTP status from the gateway onto the error taxonomy
fn classify_status(status: StatusCode) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Unauthorized(format!("gateway answered {}", status))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            GatewayError::Unavailable(format!("gateway answered {}", status))
        }
        s if s.is_server_error() => GatewayError::Unavailable(format!("gateway answered {}", s)),
        s => GatewayError::Protocol(format!("gateway answered {}", s)),
    }
}

/// Payment gateway adapter over HTTPS with basic auth
pub struct HttpGatewayClient {
    client: Client,
    base_url: Url,
    config: GatewayConfig,
}

impl HttpGatewayClient {
    /// Create a client; every request carries `config.timeout_seconds`
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(5)))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("Invalid gateway base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config("Gateway base URL cannot be a base".to_string()));
        }

        Ok(Self { client, base_url, config })
    }

    fn url(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Protocol("gateway base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> GatewayResult<T> {
        debug!(url = %url, "Querying payment gateway");

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, timeout = e.is_timeout(), "Gateway request failed");
                GatewayError::Unavailable(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = classify_status(status);
            if !matches!(err, GatewayError::NotFound) {
                warn!(url = %url, status = %status, "Gateway returned an error status");
            }
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Protocol(format!("failed to parse response: {}", e)))
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> GatewayResult<Vec<T>> {
        match self.get_json::<WireList<T>>(url).await {
            Ok(list) => Ok(list.into_items()),
            // No payment, no transfers or refunds
            Err(GatewayError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGatewayClient {
    async fn fetch_payment(&self, payment_id: &str) -> GatewayResult<Payment> {
        let url = self.url(&["payments", payment_id])?;
        self.get_json::<WirePayment>(url).await?.into_domain()
    }

    async fn fetch_transfers(&self, source_payment_id: &str, currency: Option<&str>) -> GatewayResult<Vec<Settlement>> {
        let currency = currency.unwrap_or(&self.config.default_currency);
        let mut url = self.url(&["transfers"])?;
        url.query_pairs_mut().append_pair("source_payment_id", source_payment_id);
        self.get_list::<WireTransfer>(url)
            .await?
            .into_iter()
            .map(|t| t.into_domain(currency))
            .filter(|t| !matches!(t, Ok(s) if s.source_payment_id != source_payment_id))
            .collect()
    }

    async fn fetch_refunds(&self, payment_id: &str, currency: Option<&str>) -> GatewayResult<Vec<Refund>> {
        let currency = currency.unwrap_or(&self.config.default_currency);
        let url = self.url(&["payments", payment_id, "refunds"])?;
        self.get_list::<WireRefund>(url)
            .await?
            .into_iter()
            .map(|r| r.into_domain(currency))
            .collect()
    }
}
