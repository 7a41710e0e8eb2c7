//! Order aggregate and its embedded payment record

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payments::{PaymentStatus, RefundStatus, SettlementStatus};

/// Locally mirrored state of the transfer for an order's payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SettlementRecord {
    pub transfer_id: Option<String>,
    pub status: SettlementStatus,
    pub transferred_at: Option<DateTime<Utc>>,
    pub amount_transferred: Option<Decimal>,
    pub recipient: Option<String>,
    pub settlement_id: Option<String>,
}

/// Locally mirrored refund
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundRecord {
    pub refund_id: String,
    pub amount: Decimal,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
}

/// Payment and settlement state embedded on an order.
///
/// This is a cache of gateway facts. It is only ever changed by
/// [`crate::domain::reconciliation::merge`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderPaymentRecord {
    pub payment_id: Option<String>,
    pub is_paid: bool,
    pub payment_status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub fee: Option<Decimal>,
    pub captured_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub settlement: SettlementRecord,
    #[serde(default)]
    pub refunds: Vec<RefundRecord>,
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl Default for OrderPaymentRecord {
    fn default() -> Self {
        Self {
            payment_id: None,
            is_paid: false,
            payment_status: PaymentStatus::Created,
            amount: None,
            currency: None,
            fee: None,
            captured_at: None,
            failure_reason: None,
            settlement: SettlementRecord::default(),
            refunds: Vec::new(),
            last_reconciled_at: None,
        }
    }
}

impl OrderPaymentRecord {
    /// Empty record for a checkout that just obtained a gateway payment id
    pub fn for_payment(payment_id: impl Into<String>) -> Self {
        Self {
            payment_id: Some(payment_id.into()),
            ..Self::default()
        }
    }

    /// Check the record-level invariants, returning the first violation
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_paid != (self.payment_status == PaymentStatus::Captured) {
            return Err(format!(
                "is_paid={} disagrees with payment_status={}",
                self.is_paid,
                self.payment_status.as_str()
            ));
        }
        let transferred = self.settlement.status == SettlementStatus::Transferred;
        if self.settlement.transferred_at.is_some() != transferred {
            return Err(format!(
                "transferred_at presence disagrees with settlement status {}",
                self.settlement.status.as_str()
            ));
        }
        Ok(())
    }
}

/// The subset of the order aggregate this service reads and writes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub payment: OrderPaymentRecord,
    /// Incremented on every successful write; used for conditional updates
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_id: impl Into<String>, payment: OrderPaymentRecord) -> Self {
        Self {
            order_id: order_id.into(),
            payment,
            version: 0,
            created_at: Utc::now(),
        }
    }
}
