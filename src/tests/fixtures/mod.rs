//! Wire bodies and gateway entities shared by the tests
//!
//! Amounts on the wire are minor units; the domain values are what the
//! client adapter would produce from them.

use crate::domain::payments::{Payment, PaymentStatus, Refund, RefundStatus, Settlement, SettlementStatus};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

pub const CAPTURED_AT: i64 = 1_700_000_000;
pub const TRANSFERRED_AT: i64 = 1_700_003_600;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn payment_authorized(payment_id: &str) -> Value {
    json!({
        "event": "payment.authorized",
        "payload": { "payment": { "entity": {
            "id": payment_id, "amount": 50000, "currency": "INR", "status": "authorized"
        }}}
    })
}

pub fn payment_captured(payment_id: &str, amount: i64, fee: i64) -> Value {
    json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": payment_id, "amount": amount, "currency": "INR", "status": "captured",
            "captured": true, "fee": fee, "created_at": CAPTURED_AT
        }}}
    })
}

pub fn payment_failed(payment_id: &str, reason: &str) -> Value {
    json!({
        "event": "payment.failed",
        "payload": { "payment": { "entity": {
            "id": payment_id, "status": "failed", "error_reason": reason
        }}}
    })
}

pub fn transfer_processed(transfer_id: &str, payment_id: &str, amount: i64, settlement_id: Option<&str>) -> Value {
    json!({
        "event": "transfer.processed",
        "payload": { "transfer": { "entity": {
            "id": transfer_id, "source": payment_id, "amount": amount, "currency": "INR",
            "recipient": "acc_vendor_1", "recipient_settlement_id": settlement_id,
            "processed_at": TRANSFERRED_AT
        }}}
    })
}

pub fn settlement_processed(settlement_id: &str, amount: i64) -> Value {
    json!({
        "event": "settlement.processed",
        "payload": { "settlement": { "entity": { "id": settlement_id, "amount": amount } } }
    })
}

/// Captured payment of 500.00 with a 10.00 fee
pub fn captured_payment(payment_id: &str) -> Payment {
    Payment {
        id: payment_id.to_string(),
        amount: Decimal::new(50000, 2),
        currency: "INR".to_string(),
        status: PaymentStatus::Captured,
        captured: true,
        fee: Some(Decimal::new(1000, 2)),
        created_at: at(CAPTURED_AT),
        failure_reason: None,
    }
}

/// Transfer of 490.00 out of the payment
pub fn transferred(transfer_id: &str, payment_id: &str) -> Settlement {
    Settlement {
        transfer_id: transfer_id.to_string(),
        source_payment_id: payment_id.to_string(),
        status: SettlementStatus::Transferred,
        transferred_at: Some(at(TRANSFERRED_AT)),
        amount_transferred: Decimal::new(49000, 2),
        recipient: Some("acc_vendor_1".to_string()),
        settlement_id: None,
    }
}

pub fn processed_refund(refund_id: &str, payment_id: &str, minor: i64) -> Refund {
    Refund {
        id: refund_id.to_string(),
        payment_id: payment_id.to_string(),
        amount: Decimal::new(minor, 2),
        status: RefundStatus::Processed,
        created_at: at(TRANSFERRED_AT + 60),
    }
}
