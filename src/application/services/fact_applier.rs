//! Shared apply loop for webhook and poller facts
//!
//! Reads the order, merges, and writes conditionally on the version it read.
//! A version conflict means another writer got there first, so the loop
//! reloads and merges again against the newer record.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::order::OrderPaymentRecord;
use crate::domain::ports::{OrderRepository, WriteOutcome};
use crate::domain::reconciliation::{merge, MergeOutcome, PartialPaymentFacts};
use crate::shared::error::{AppError, AppResult};

/// What applying one set of facts did to an order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    pub order_id: String,
    /// Version of the stored order after the apply
    pub version: u64,
    /// Merged record as of this apply
    pub record: OrderPaymentRecord,
    pub outcome: MergeOutcome,
}

impl ApplyOutcome {
    pub fn updated(&self) -> bool {
        self.outcome == MergeOutcome::Updated
    }
}

pub struct FactApplier {
    orders: Arc<dyn OrderRepository>,
    max_conflict_retries: u32,
}

impl FactApplier {
    pub fn new(orders: Arc<dyn OrderRepository>, max_conflict_retries: u32) -> Self {
        Self { orders, max_conflict_retries }
    }

    /// Merge `facts` into the order and persist if anything changed
    #[instrument(skip(self, facts), fields(payment_id = %facts.payment_id, source = ?facts.source))]
    pub async fn apply(&self, order_id: &str, facts: &PartialPaymentFacts) -> AppResult<ApplyOutcome> {
        let mut conflicts = 0u32;

        loop {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;

            let result = merge(&order.payment, facts, Utc::now());
            if !result.changed() {
                debug!(outcome = result.outcome.as_str(), "Nothing to write");
                return Ok(ApplyOutcome {
                    order_id: order.order_id,
                    version: order.version,
                    record: result.record,
                    outcome: result.outcome,
                });
            }

            match self
                .orders
                .compare_and_swap(order_id, order.version, result.record)
                .await?
            {
                WriteOutcome::Written(stored) => {
                    info!(
                        version = stored.version,
                        payment_status = stored.payment.payment_status.as_str(),
                        settlement_status = stored.payment.settlement.status.as_str(),
                        "Order payment record updated"
                    );
                    return Ok(ApplyOutcome {
                        order_id: stored.order_id,
                        version: stored.version,
                        record: stored.payment,
                        outcome: MergeOutcome::Updated,
                    });
                }
                WriteOutcome::VersionConflict => {
                    conflicts += 1;
                    if conflicts > self.max_conflict_retries {
                        warn!(conflicts, "Giving up after repeated version conflicts");
                        return Err(AppError::Conflict(format!(
                            "order {} changed concurrently {} times",
                            order_id, conflicts
                        )));
                    }
                    debug!(conflicts, expected_version = order.version, "Version conflict, re-merging");
                }
            }
        }
    }

    /// Apply facts to whichever order carries their payment id.
    ///
    /// Returns `None` when no order knows the payment.
    pub async fn apply_by_payment(&self, facts: &PartialPaymentFacts) -> AppResult<Option<ApplyOutcome>> {
        match self.orders.find_by_payment_id(&facts.payment_id).await? {
            Some(order) => self.apply(&order.order_id, facts).await.map(Some),
            None => {
                debug!(payment_id = %facts.payment_id, "No order references this payment");
                Ok(None)
            }
        }
    }
}
