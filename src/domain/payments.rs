//! Gateway-owned payment resources as seen by this service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Failed,
}

impl PaymentStatus {
    /// Position in the merge order.
    ///
    /// CREATED < AUTHORIZED < CAPTURED along the main lane. FAILED sits above
    /// every non-captured status and below CAPTURED, so it absorbs late
    /// authorizations but never undoes a capture.
    pub fn precedence(self) -> u8 {
        match self {
            PaymentStatus::Created => 0,
            PaymentStatus::Authorized => 1,
            PaymentStatus::Failed => 2,
            PaymentStatus::Captured => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(PaymentStatus::Created),
            "authorized" => Ok(PaymentStatus::Authorized),
            "captured" => Ok(PaymentStatus::Captured),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(format!("unsupported payment status: {}", s)),
        }
    }
}

/// Status of the transfer that moves captured funds to the merchant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    #[default]
    None,
    Pending,
    Transferred,
    Failed,
}

impl SettlementStatus {
    /// Position in the merge order; TRANSFERRED is final
    pub fn precedence(self) -> u8 {
        match self {
            SettlementStatus::None => 0,
            SettlementStatus::Pending => 1,
            SettlementStatus::Failed => 2,
            SettlementStatus::Transferred => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::None => "none",
            SettlementStatus::Pending => "pending",
            SettlementStatus::Transferred => "transferred",
            SettlementStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SettlementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(SettlementStatus::None),
            "created" | "pending" | "processing" => Ok(SettlementStatus::Pending),
            "processed" | "settled" | "transferred" => Ok(SettlementStatus::Transferred),
            "failed" | "reversed" => Ok(SettlementStatus::Failed),
            _ => Err(format!("unsupported transfer status: {}", s)),
        }
    }
}

/// Refund status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Pending,
    Failed,
    Processed,
}

impl RefundStatus {
    pub fn precedence(self) -> u8 {
        match self {
            RefundStatus::Pending => 0,
            RefundStatus::Failed => 1,
            RefundStatus::Processed => 2,
        }
    }
}

impl std::str::FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" | "pending" => Ok(RefundStatus::Pending),
            "processed" => Ok(RefundStatus::Processed),
            "failed" => Ok(RefundStatus::Failed),
            _ => Err(format!("unsupported refund status: {}", s)),
        }
    }
}

/// A gateway payment transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub captured: bool,
    pub fee: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

/// A gateway transfer of captured funds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub transfer_id: String,
    pub source_payment_id: String,
    pub status: SettlementStatus,
    pub transferred_at: Option<DateTime<Utc>>,
    pub amount_transferred: Decimal,
    pub recipient: Option<String>,
    pub settlement_id: Option<String>,
}

/// A refund issued against a payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub amount: Decimal,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
}

/// A processed settlement whose originating payment is not known yet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnattachedSettlement {
    pub settlement_id: String,
    pub amount: Decimal,
    pub received_at: DateTime<Utc>,
}
