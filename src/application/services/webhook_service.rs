//! Webhook intake: verify, classify, dispatch
//!
//! The webhook path never calls the gateway. Everything it learns comes from
//! the signed body.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::fact_applier::{ApplyOutcome, FactApplier};
use crate::config::{GatewayConfig, WebhookConfig};
use crate::domain::events::{classify, GatewayEvent};
use crate::domain::payments::{SettlementStatus, UnattachedSettlement};
use crate::domain::ports::{OrderRepository, UnattachedSettlementRepository};
use crate::domain::reconciliation::{FactSource, MergeOutcome, PartialPaymentFacts, SettlementFacts};
use crate::domain::signature;
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

/// Acknowledgement returned to the gateway with HTTP 200
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookAck {
    /// Facts were merged (or were already reflected)
    Processed,
    /// Unknown kind, unknown payment, or a payment foreign to its order
    Ignored,
    /// Settlement parked until its transfer shows up
    Unattached,
    /// Known kind with unusable fields
    Malformed,
}

impl WebhookAck {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookAck::Processed => "processed",
            WebhookAck::Ignored => "ignored",
            WebhookAck::Unattached => "unattached",
            WebhookAck::Malformed => "malformed",
        }
    }
}

pub struct WebhookService {
    webhook: WebhookConfig,
    default_currency: String,
    applier: Arc<FactApplier>,
    orders: Arc<dyn OrderRepository>,
    unattached: Arc<dyn UnattachedSettlementRepository>,
    monitoring: Arc<MonitoringAdapter>,
}

impl WebhookService {
    pub fn new(
        webhook: WebhookConfig,
        gateway: &GatewayConfig,
        applier: Arc<FactApplier>,
        orders: Arc<dyn OrderRepository>,
        unattached: Arc<dyn UnattachedSettlementRepository>,
        monitoring: Arc<MonitoringAdapter>,
    ) -> Self {
        Self {
            webhook,
            default_currency: gateway.default_currency.clone(),
            applier,
            orders,
            unattached,
            monitoring,
        }
    }

    /// Name of the header carrying the signature
    pub fn signature_header(&self) -> &str {
        &self.webhook.signature_header
    }

    /// Handle one delivery. `raw_body` must be the exact bytes received.
    #[instrument(skip(self, raw_body, signature), fields(request_id = %request_id, size = raw_body.len()))]
    pub async fn handle(&self, request_id: &str, raw_body: &[u8], signature: Option<&str>) -> AppResult<WebhookAck> {
        if !signature::verify(raw_body, signature.unwrap_or_default(), &self.webhook.secret) {
            LoggingUtils::log_security_event(
                "webhook_signature_invalid",
                &format!("request_id={} signature_present={}", request_id, signature.is_some()),
            );
            self.monitoring.record_webhook("unverified", "signature_invalid");
            return Err(AppError::SignatureInvalid);
        }

        let body: Value = serde_json::from_slice(raw_body).map_err(|e| {
            self.monitoring.record_webhook("unparsed", "invalid_json");
            AppError::Json(e.to_string())
        })?;

        let event = match classify(&body, &self.default_currency) {
            Ok(event) => event,
            Err(AppError::MalformedFacts(reason)) => {
                let kind = body.get("event").and_then(Value::as_str).unwrap_or("unknown");
                warn!(kind = %kind, reason = %reason, "Acknowledging malformed webhook without merging");
                self.monitoring.record_webhook(metric_kind(kind), WebhookAck::Malformed.as_str());
                return Ok(WebhookAck::Malformed);
            }
            Err(e) => return Err(e),
        };

        let kind = match &event {
            GatewayEvent::Unknown { .. } => "unknown",
            known => known.kind(),
        };
        let ack = self.dispatch(&event).await?;

        LoggingUtils::log_webhook(request_id, event.kind(), ack.as_str());
        self.monitoring.record_webhook(kind, ack.as_str());
        Ok(ack)
    }

    async fn dispatch(&self, event: &GatewayEvent) -> AppResult<WebhookAck> {
        match event {
            GatewayEvent::Unknown { kind } => {
                info!(kind = %kind, "Ignoring unhandled webhook kind");
                Ok(WebhookAck::Ignored)
            }
            GatewayEvent::SettlementProcessed { settlement_id, amount } => {
                self.settlement_processed(settlement_id, *amount).await
            }
            GatewayEvent::TransferCreated { settlement_id, .. } => {
                let ack = self.apply_event(event).await?;
                if let (WebhookAck::Processed, Some(settlement_id)) = (ack, settlement_id) {
                    if let Some(parked) = self.unattached.take(settlement_id).await? {
                        info!(
                            settlement_id = %parked.settlement_id,
                            received_at = %parked.received_at,
                            "Resolved unattached settlement"
                        );
                    }
                }
                Ok(ack)
            }
            _ => self.apply_event(event).await,
        }
    }

    async fn apply_event(&self, event: &GatewayEvent) -> AppResult<WebhookAck> {
        let Some(facts) = event.to_facts() else {
            return Ok(WebhookAck::Ignored);
        };
        let outcome = self.applier.apply_by_payment(&facts).await?;
        Ok(ack_for(outcome.as_ref()))
    }

    /// A settlement names no payment. Attach it through a transfer that
    /// already carries its id, otherwise park it.
    async fn settlement_processed(&self, settlement_id: &str, amount: Decimal) -> AppResult<WebhookAck> {
        if let Some(ack) = self.attach_settlement(settlement_id).await? {
            return Ok(ack);
        }

        info!(settlement_id = %settlement_id, amount = %amount, "Parking settlement until its transfer is known");
        self.unattached
            .put(UnattachedSettlement {
                settlement_id: settlement_id.to_string(),
                amount,
                received_at: Utc::now(),
            })
            .await?;

        // A transfer naming this settlement may have merged between the lookup and the put
        if let Some(ack) = self.attach_settlement(settlement_id).await? {
            self.unattached.take(settlement_id).await?;
            info!(settlement_id = %settlement_id, "Settlement was linked while parking, released it");
            return Ok(ack);
        }
        Ok(WebhookAck::Unattached)
    }

    /// Merge the settlement into the order whose transfer names it, if any
    async fn attach_settlement(&self, settlement_id: &str) -> AppResult<Option<WebhookAck>> {
        let Some(order) = self.orders.find_by_settlement_id(settlement_id).await? else {
            return Ok(None);
        };
        let Some(payment_id) = order.payment.payment_id.clone() else {
            return Ok(None);
        };

        let facts = PartialPaymentFacts::new(payment_id, FactSource::Webhook).with_settlement(SettlementFacts {
            transfer_id: None,
            status: SettlementStatus::Transferred,
            transferred_at: None,
            amount: None,
            recipient: None,
            settlement_id: Some(settlement_id.to_string()),
        });
        let outcome = self.applier.apply(&order.order_id, &facts).await?;
        Ok(Some(ack_for(Some(&outcome))))
    }
}

fn ack_for(outcome: Option<&ApplyOutcome>) -> WebhookAck {
    match outcome.map(|o| &o.outcome) {
        Some(MergeOutcome::Updated) | Some(MergeOutcome::Converged) => WebhookAck::Processed,
        Some(MergeOutcome::Rejected(_)) => WebhookAck::Malformed,
        Some(MergeOutcome::IgnoredForeignPayment) | None => WebhookAck::Ignored,
    }
}

/// Bound metric label cardinality to the kinds we understand
fn metric_kind(kind: &str) -> &str {
    match kind {
        "payment.authorized" | "payment.captured" | "payment.failed" | "settlement.processed"
        | "transfer.processed" => kind,
        _ => "unknown",
    }
}
