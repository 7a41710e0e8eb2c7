//! Reconciliation merger
//!
//! Merges fresh gateway facts into an [`OrderPaymentRecord`]. The merge is a
//! pure function: every status moves along a fixed precedence order, so the
//! result is the same whatever order facts arrive in and however often they
//! are repeated. Both the webhook path and the poller go through [`merge`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::order::{OrderPaymentRecord, RefundRecord, SettlementRecord};
use super::payments::{Payment, PaymentStatus, Refund, Settlement, SettlementStatus};

/// Where a set of facts came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    Webhook,
    Poll,
}

/// Payment lifecycle facts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFacts {
    pub status: Option<PaymentStatus>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub fee: Option<Decimal>,
    pub captured_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl From<&Payment> for PaymentFacts {
    fn from(payment: &Payment) -> Self {
        // A captured flag on an otherwise authorized payment is still a capture
        let status = if payment.captured && payment.status == PaymentStatus::Authorized {
            PaymentStatus::Captured
        } else {
            payment.status
        };
        Self {
            status: Some(status),
            amount: Some(payment.amount),
            currency: Some(payment.currency.clone()),
            fee: payment.fee,
            captured_at: (status == PaymentStatus::Captured).then_some(payment.created_at),
            failure_reason: payment.failure_reason.clone(),
        }
    }
}

/// Transfer facts
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementFacts {
    pub transfer_id: Option<String>,
    pub status: SettlementStatus,
    pub transferred_at: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub recipient: Option<String>,
    pub settlement_id: Option<String>,
}

impl From<&Settlement> for SettlementFacts {
    fn from(settlement: &Settlement) -> Self {
        Self {
            transfer_id: Some(settlement.transfer_id.clone()),
            status: settlement.status,
            transferred_at: settlement.transferred_at,
            amount: Some(settlement.amount_transferred),
            recipient: settlement.recipient.clone(),
            settlement_id: settlement.settlement_id.clone(),
        }
    }
}

impl SettlementFacts {
    /// Pick the most advanced transfer out of a gateway listing
    pub fn most_advanced(transfers: &[Settlement]) -> Option<Self> {
        transfers
            .iter()
            .max_by(|a, b| {
                a.status
                    .precedence()
                    .cmp(&b.status.precedence())
                    .then_with(|| a.transferred_at.cmp(&b.transferred_at))
                    .then_with(|| b.transfer_id.cmp(&a.transfer_id))
            })
            .map(SettlementFacts::from)
    }
}

impl From<&Refund> for RefundRecord {
    fn from(refund: &Refund) -> Self {
        Self {
            refund_id: refund.id.clone(),
            amount: refund.amount,
            status: refund.status,
            created_at: refund.created_at,
        }
    }
}

/// Whatever is currently known about one payment. Every part is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialPaymentFacts {
    pub payment_id: String,
    pub source: FactSource,
    pub payment: Option<PaymentFacts>,
    pub settlement: Option<SettlementFacts>,
    pub refunds: Vec<RefundRecord>,
}

impl PartialPaymentFacts {
    pub fn new(payment_id: impl Into<String>, source: FactSource) -> Self {
        Self {
            payment_id: payment_id.into(),
            source,
            payment: None,
            settlement: None,
            refunds: Vec::new(),
        }
    }

    pub fn with_payment(mut self, payment: PaymentFacts) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_settlement(mut self, settlement: SettlementFacts) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub fn with_refunds(mut self, refunds: Vec<RefundRecord>) -> Self {
        self.refunds = refunds;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payment.is_none() && self.settlement.is_none() && self.refunds.is_empty()
    }
}

/// What a merge did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// At least one field changed; the record should be persisted
    Updated,
    /// Facts were already reflected in the record
    Converged,
    /// Facts belong to a different payment id; record untouched
    IgnoredForeignPayment,
    /// Nothing usable survived validation; record untouched
    Rejected(String),
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Updated => "updated",
            MergeOutcome::Converged => "converged",
            MergeOutcome::IgnoredForeignPayment => "ignored_foreign_payment",
            MergeOutcome::Rejected(_) => "rejected",
        }
    }
}

/// Merge output: the next record and what happened
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub record: OrderPaymentRecord,
    pub outcome: MergeOutcome,
}

impl MergeResult {
    pub fn changed(&self) -> bool {
        self.outcome == MergeOutcome::Updated
    }
}

/// Merge `facts` into `current` as of `now`
pub fn merge(current: &OrderPaymentRecord, facts: &PartialPaymentFacts, now: DateTime<Utc>) -> MergeResult {
    if let Some(existing) = current.payment_id.as_deref() {
        if existing != facts.payment_id {
            debug!(
                record_payment_id = %existing,
                fact_payment_id = %facts.payment_id,
                source = ?facts.source,
                "Ignoring facts for a foreign payment"
            );
            return MergeResult {
                record: current.clone(),
                outcome: MergeOutcome::IgnoredForeignPayment,
            };
        }
    }

    let facts = match sanitize(facts) {
        Ok(facts) => facts,
        Err(reason) => {
            warn!(payment_id = %facts.payment_id, source = ?facts.source, reason = %reason, "Rejecting malformed facts");
            return MergeResult {
                record: current.clone(),
                outcome: MergeOutcome::Rejected(reason),
            };
        }
    };

    let mut next = current.clone();
    if next.payment_id.is_none() {
        next.payment_id = Some(facts.payment_id.clone());
    }

    if let Some(payment) = &facts.payment {
        merge_payment(&mut next, payment, now);
    }
    next.is_paid = next.payment_status == PaymentStatus::Captured;

    if let Some(settlement) = &facts.settlement {
        merge_settlement(&mut next.settlement, settlement, now);
    }

    merge_refunds(&mut next.refunds, &facts.refunds);

    let outcome = if next != *current {
        MergeOutcome::Updated
    } else {
        MergeOutcome::Converged
    };
    next.last_reconciled_at = Some(now);

    MergeResult { record: next, outcome }
}

/// Drop unusable parts of the facts, failing only if nothing usable is left
fn sanitize(facts: &PartialPaymentFacts) -> Result<PartialPaymentFacts, String> {
    if facts.payment_id.trim().is_empty() {
        return Err("payment id is empty".to_string());
    }

    let mut clean = facts.clone();
    let mut dropped = Vec::new();

    if let Some(payment) = clean.payment.as_mut() {
        if payment.amount.is_some_and(|a| a <= Decimal::ZERO) {
            dropped.push("payment: non-positive amount");
            clean.payment = None;
        } else if payment.fee.is_some_and(|f| f < Decimal::ZERO) {
            dropped.push("payment.fee: negative");
            payment.fee = None;
        }
    }

    if clean
        .settlement
        .as_ref()
        .is_some_and(|s| s.amount.is_some_and(|a| a <= Decimal::ZERO))
    {
        dropped.push("settlement: non-positive amount");
        clean.settlement = None;
    }

    let before = clean.refunds.len();
    clean.refunds.retain(|r| r.amount > Decimal::ZERO && !r.refund_id.is_empty());
    if clean.refunds.len() != before {
        dropped.push("refunds: invalid entries");
    }

    if dropped.is_empty() {
        return Ok(clean);
    }

    warn!(payment_id = %facts.payment_id, dropped = ?dropped, "Dropped malformed fields from facts");
    if clean.is_empty() {
        Err(dropped.join(", "))
    } else {
        Ok(clean)
    }
}

fn merge_payment(record: &mut OrderPaymentRecord, facts: &PaymentFacts, now: DateTime<Utc>) {
    let current = record.payment_status;
    let relation = facts.status.map(|s| s.precedence().cmp(&current.precedence()));

    match relation {
        // Stale lifecycle fact; details describe an earlier state
        Some(std::cmp::Ordering::Less) => return,
        Some(std::cmp::Ordering::Greater) => {
            if let Some(status) = facts.status {
                record.payment_status = status;
                record.failure_reason = if status == PaymentStatus::Failed {
                    facts.failure_reason.clone()
                } else {
                    None
                };
            }
            overwrite(&mut record.amount, &facts.amount);
            overwrite(&mut record.currency, &facts.currency);
            overwrite(&mut record.fee, &facts.fee);
            overwrite(&mut record.captured_at, &facts.captured_at);
            if record.payment_status == PaymentStatus::Captured && record.captured_at.is_none() {
                record.captured_at = Some(now);
            }
        }
        Some(std::cmp::Ordering::Equal) | None => {
            fill(&mut record.amount, &facts.amount);
            fill(&mut record.currency, &facts.currency);
            fill(&mut record.fee, &facts.fee);
            fill(&mut record.captured_at, &facts.captured_at);
            if record.payment_status == PaymentStatus::Failed {
                fill(&mut record.failure_reason, &facts.failure_reason);
            }
        }
    }
}

fn merge_settlement(record: &mut SettlementRecord, facts: &SettlementFacts, now: DateTime<Utc>) {
    if record.status == SettlementStatus::Transferred {
        let same_transfer = match (&record.transfer_id, &facts.transfer_id) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        };
        if !same_transfer {
            warn!(
                recorded = ?record.transfer_id,
                incoming = ?facts.transfer_id,
                "Ignoring a second transfer for an already transferred payment"
            );
            return;
        }
        fill(&mut record.transfer_id, &facts.transfer_id);
        fill(&mut record.amount_transferred, &facts.amount);
        fill(&mut record.recipient, &facts.recipient);
        fill(&mut record.settlement_id, &facts.settlement_id);
        return;
    }

    match facts.status.precedence().cmp(&record.status.precedence()) {
        std::cmp::Ordering::Greater => {
            record.status = facts.status;
            overwrite(&mut record.transfer_id, &facts.transfer_id);
            overwrite(&mut record.amount_transferred, &facts.amount);
            overwrite(&mut record.recipient, &facts.recipient);
            overwrite(&mut record.settlement_id, &facts.settlement_id);
            record.transferred_at = if facts.status == SettlementStatus::Transferred {
                Some(facts.transferred_at.unwrap_or(now))
            } else {
                None
            };
        }
        std::cmp::Ordering::Equal => {
            fill(&mut record.transfer_id, &facts.transfer_id);
            fill(&mut record.amount_transferred, &facts.amount);
            fill(&mut record.recipient, &facts.recipient);
            fill(&mut record.settlement_id, &facts.settlement_id);
        }
        std::cmp::Ordering::Less => {
            fill(&mut record.settlement_id, &facts.settlement_id);
        }
    }
}

fn merge_refunds(records: &mut Vec<RefundRecord>, facts: &[RefundRecord]) {
    if facts.is_empty() {
        return;
    }
    for fact in facts {
        match records.iter_mut().find(|r| r.refund_id == fact.refund_id) {
            Some(existing) => {
                if fact.status.precedence() > existing.status.precedence() {
                    existing.status = fact.status;
                }
            }
            None => records.push(fact.clone()),
        }
    }
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.refund_id.cmp(&b.refund_id)));
}

fn overwrite<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *slot = value.clone();
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        *slot = value.clone();
    }
}
