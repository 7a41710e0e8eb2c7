//! Gateway webhook events
//!
//! Inbound envelopes look like
//! `{ "event": "<kind>", "payload": { "payment"?, "settlement"?, "transfer"? } }`
//! where each entity may be wrapped in `{ "entity": { ... } }`. Amounts on the
//! wire are integers in the currency's minor unit.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::money::from_minor_units;
use super::payments::{PaymentStatus, SettlementStatus};
use super::reconciliation::{FactSource, PartialPaymentFacts, PaymentFacts, SettlementFacts};
use crate::shared::error::{AppError, AppResult};

static GATEWAY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]{0,63}$").unwrap_or_else(|e| panic!("invalid id pattern: {e}"))
});

/// A classified webhook event carrying only what reconciliation needs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    PaymentAuthorized {
        payment_id: String,
    },
    PaymentCaptured {
        payment_id: String,
        amount: Decimal,
        currency: String,
        fee: Option<Decimal>,
        /// Absent when the gateway sent neither capture nor creation time
        captured_at: Option<DateTime<Utc>>,
    },
    PaymentFailed {
        payment_id: String,
        reason: Option<String>,
    },
    /// Carries no payment id; see the unattached settlement store
    SettlementProcessed {
        settlement_id: String,
        amount: Decimal,
    },
    TransferCreated {
        transfer_id: String,
        source_payment_id: String,
        amount: Decimal,
        created_at: Option<DateTime<Utc>>,
        recipient: Option<String>,
        settlement_id: Option<String>,
    },
    Unknown {
        kind: String,
    },
}

impl GatewayEvent {
    /// Wire kind used for logs and metric labels
    pub fn kind(&self) -> &str {
        match self {
            GatewayEvent::PaymentAuthorized { .. } => "payment.authorized",
            GatewayEvent::PaymentCaptured { .. } => "payment.captured",
            GatewayEvent::PaymentFailed { .. } => "payment.failed",
            GatewayEvent::SettlementProcessed { .. } => "settlement.processed",
            GatewayEvent::TransferCreated { .. } => "transfer.processed",
            GatewayEvent::Unknown { kind } => kind,
        }
    }

    /// The payment this event is about, when the event names one
    pub fn payment_id(&self) -> Option<&str> {
        match self {
            GatewayEvent::PaymentAuthorized { payment_id }
            | GatewayEvent::PaymentCaptured { payment_id, .. }
            | GatewayEvent::PaymentFailed { payment_id, .. } => Some(payment_id),
            GatewayEvent::TransferCreated { source_payment_id, .. } => Some(source_payment_id),
            GatewayEvent::SettlementProcessed { .. } | GatewayEvent::Unknown { .. } => None,
        }
    }

    /// Partial facts for events that name their payment
    pub fn to_facts(&self) -> Option<PartialPaymentFacts> {
        match self {
            GatewayEvent::PaymentAuthorized { payment_id } => Some(
                PartialPaymentFacts::new(payment_id, FactSource::Webhook).with_payment(PaymentFacts {
                    status: Some(PaymentStatus::Authorized),
                    ..PaymentFacts::default()
                }),
            ),
            GatewayEvent::PaymentCaptured { payment_id, amount, currency, fee, captured_at } => Some(
                PartialPaymentFacts::new(payment_id, FactSource::Webhook).with_payment(PaymentFacts {
                    status: Some(PaymentStatus::Captured),
                    amount: Some(*amount),
                    currency: Some(currency.clone()),
                    fee: *fee,
                    captured_at: *captured_at,
                    failure_reason: None,
                }),
            ),
            GatewayEvent::PaymentFailed { payment_id, reason } => Some(
                PartialPaymentFacts::new(payment_id, FactSource::Webhook).with_payment(PaymentFacts {
                    status: Some(PaymentStatus::Failed),
                    failure_reason: reason.clone(),
                    ..PaymentFacts::default()
                }),
            ),
            GatewayEvent::TransferCreated {
                transfer_id,
                source_payment_id,
                amount,
                created_at,
                recipient,
                settlement_id,
            } => Some(
                PartialPaymentFacts::new(source_payment_id, FactSource::Webhook).with_settlement(SettlementFacts {
                    transfer_id: Some(transfer_id.clone()),
                    status: SettlementStatus::Transferred,
                    transferred_at: *created_at,
                    amount: Some(*amount),
                    recipient: recipient.clone(),
                    settlement_id: settlement_id.clone(),
                }),
            ),
            GatewayEvent::SettlementProcessed { .. } | GatewayEvent::Unknown { .. } => None,
        }
    }
}

/// Classify a parsed webhook body.
///
/// Unrecognised kinds become [`GatewayEvent::Unknown`]. A recognised kind with
/// missing or invalid required fields is [`AppError::MalformedFacts`].
pub fn classify(body: &Value, default_currency: &str) -> AppResult<GatewayEvent> {
    let kind = body
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::MalformedFacts("missing event kind".into()))?;
    let payload = body.get("payload").unwrap_or(&Value::Null);

    match kind {
        "payment.authorized" => {
            let payment = entity(payload, "payment")?;
            Ok(GatewayEvent::PaymentAuthorized { payment_id: gateway_id(payment, "id")? })
        }
        "payment.captured" => {
            let payment = entity(payload, "payment")?;
            let currency = currency(payment, default_currency);
            Ok(GatewayEvent::PaymentCaptured {
                payment_id: gateway_id(payment, "id")?,
                amount: required_amount(payment, "amount", &currency)?,
                fee: optional_amount(payment, "fee", &currency),
                captured_at: timestamp(payment, "captured_at").or_else(|| timestamp(payment, "created_at")),
                currency,
            })
        }
        "payment.failed" => {
            let payment = entity(payload, "payment")?;
            let reason = ["error_reason", "error_description", "error_code"]
                .iter()
                .find_map(|key| payment.get(*key).and_then(Value::as_str))
                .map(str::to_string);
            Ok(GatewayEvent::PaymentFailed { payment_id: gateway_id(payment, "id")?, reason })
        }
        "settlement.processed" => {
            let settlement = entity(payload, "settlement")?;
            let currency = currency(settlement, default_currency);
            Ok(GatewayEvent::SettlementProcessed {
                settlement_id: gateway_id(settlement, "id")?,
                amount: positive(required_amount(settlement, "amount", &currency)?, "amount")?,
            })
        }
        "transfer.processed" => {
            let transfer = entity(payload, "transfer")?;
            let currency = currency(transfer, default_currency);
            Ok(GatewayEvent::TransferCreated {
                transfer_id: gateway_id(transfer, "id")?,
                source_payment_id: gateway_id(transfer, "source")?,
                amount: required_amount(transfer, "amount", &currency)?,
                created_at: timestamp(transfer, "processed_at").or_else(|| timestamp(transfer, "created_at")),
                recipient: transfer.get("recipient").and_then(Value::as_str).map(str::to_string),
                settlement_id: transfer
                    .get("recipient_settlement_id")
                    .and_then(Value::as_str)
                    .filter(|id| GATEWAY_ID.is_match(id))
                    .map(str::to_string),
            })
        }
        other => Ok(GatewayEvent::Unknown { kind: other.to_string() }),
    }
}

fn entity<'a>(payload: &'a Value, name: &str) -> AppResult<&'a Value> {
    let wrapper = payload
        .get(name)
        .filter(|v| v.is_object())
        .ok_or_else(|| AppError::MalformedFacts(format!("payload has no {} object", name)))?;
    Ok(wrapper.get("entity").filter(|v| v.is_object()).unwrap_or(wrapper))
}

fn gateway_id(entity: &Value, field: &str) -> AppResult<String> {
    entity
        .get(field)
        .and_then(Value::as_str)
        .filter(|id| GATEWAY_ID.is_match(id))
        .map(str::to_string)
        .ok_or_else(|| AppError::MalformedFacts(format!("missing or invalid {}", field)))
}

fn currency(entity: &Value, default_currency: &str) -> String {
    entity
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or(default_currency)
        .to_ascii_uppercase()
}

fn required_amount(entity: &Value, field: &str, currency: &str) -> AppResult<Decimal> {
    entity
        .get(field)
        .and_then(Value::as_i64)
        .map(|minor| from_minor_units(minor, currency))
        .ok_or_else(|| AppError::MalformedFacts(format!("missing or non-integer {}", field)))
}

fn positive(amount: Decimal, field: &str) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::MalformedFacts(format!("non-positive {}", field)));
    }
    Ok(amount)
}

fn optional_amount(entity: &Value, field: &str, currency: &str) -> Option<Decimal> {
    entity.get(field).and_then(Value::as_i64).map(|minor| from_minor_units(minor, currency))
}

/// Unix seconds or an RFC 3339 string
pub(crate) fn timestamp(entity: &Value, field: &str) -> Option<DateTime<Utc>> {
    match entity.get(field)? {
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}
