//! On-demand reconciliation against the gateway's query API

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::fact_applier::FactApplier;
use crate::domain::order::{OrderPaymentRecord, RefundRecord};
use crate::domain::payments::{Payment, Refund, Settlement};
use crate::domain::ports::{
    GatewayError, GatewayResult, OrderRepository, PaymentGateway, UnattachedSettlementRepository,
};
use crate::domain::reconciliation::{FactSource, MergeOutcome, PartialPaymentFacts, PaymentFacts, SettlementFacts};
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::error::{AppError, AppResult};

/// The three gateway resources as fetched, for the caller to inspect
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewaySnapshot {
    pub payment: Option<Payment>,
    pub transfers: Option<Vec<Settlement>>,
    pub refunds: Option<Vec<Refund>>,
    /// Per-operation failures, keyed by operation name
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub updated: bool,
    pub outcome: String,
    pub record: OrderPaymentRecord,
    pub snapshot: GatewaySnapshot,
}

pub struct ReconciliationService {
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    applier: Arc<FactApplier>,
    unattached: Arc<dyn UnattachedSettlementRepository>,
    monitoring: Arc<MonitoringAdapter>,
}

impl ReconciliationService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        applier: Arc<FactApplier>,
        unattached: Arc<dyn UnattachedSettlementRepository>,
        monitoring: Arc<MonitoringAdapter>,
    ) -> Self {
        Self { orders, gateway, applier, unattached, monitoring }
    }

    /// Pull payment, transfer and refund state for the order's payment and
    /// merge whatever the gateway returned.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, order_id: &str) -> AppResult<ReconciliationResult> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;

        let Some(payment_id) = order.payment.payment_id.clone() else {
            info!("Order has no gateway payment yet, nothing to reconcile");
            self.monitoring.record_reconciliation("nothing_to_reconcile");
            return Ok(ReconciliationResult {
                updated: false,
                outcome: "nothing_to_reconcile".to_string(),
                record: order.payment,
                snapshot: GatewaySnapshot::default(),
            });
        };

        let (payment, transfers, refunds) = self.fetch_all(&payment_id, order.payment.currency.as_deref()).await;
        self.monitoring.record_gateway_request("fetch_payment", &payment);
        self.monitoring.record_gateway_request("fetch_transfers", &transfers);
        self.monitoring.record_gateway_request("fetch_refunds", &refunds);

        if let Some(err) = first_unauthorized([
            payment.as_ref().err(),
            transfers.as_ref().err(),
            refunds.as_ref().err(),
        ]) {
            error!(payment_id = %payment_id, error = %err, "Gateway rejected our credentials");
            self.monitoring.record_reconciliation("gateway_unauthorized");
            return Err(err.clone().into());
        }

        if all_unavailable(&payment, &transfers, &refunds) {
            warn!(payment_id = %payment_id, "Gateway unavailable for every query, nothing written");
            self.monitoring.record_reconciliation("gateway_unavailable");
            return Err(AppError::GatewayUnavailable(format!(
                "no gateway query for payment {} succeeded",
                payment_id
            )));
        }

        let mut snapshot = GatewaySnapshot::default();
        let mut facts = PartialPaymentFacts::new(&payment_id, FactSource::Poll);

        match payment {
            Ok(payment) => {
                facts = facts.with_payment(PaymentFacts::from(&payment));
                snapshot.payment = Some(payment);
            }
            Err(e) => note_failure(&mut snapshot, "fetch_payment", e),
        }
        match transfers {
            Ok(transfers) => {
                if let Some(settlement) = SettlementFacts::most_advanced(&transfers) {
                    facts = facts.with_settlement(settlement);
                }
                snapshot.transfers = Some(transfers);
            }
            Err(e) => note_failure(&mut snapshot, "fetch_transfers", e),
        }
        match refunds {
            Ok(refunds) => {
                facts = facts.with_refunds(refunds.iter().map(RefundRecord::from).collect());
                snapshot.refunds = Some(refunds);
            }
            Err(e) => note_failure(&mut snapshot, "fetch_refunds", e),
        }

        if facts.is_empty() {
            info!(payment_id = %payment_id, "Gateway returned nothing to merge");
            self.monitoring.record_reconciliation("converged");
            return Ok(ReconciliationResult {
                updated: false,
                outcome: MergeOutcome::Converged.as_str().to_string(),
                record: order.payment,
                snapshot,
            });
        }

        let applied = self.applier.apply(order_id, &facts).await?;
        match &applied.outcome {
            MergeOutcome::IgnoredForeignPayment => {
                warn!(payment_id = %payment_id, "Order was linked to another payment during reconciliation");
                self.monitoring.record_reconciliation(applied.outcome.as_str());
                return Err(AppError::ForeignPayment);
            }
            MergeOutcome::Rejected(reason) => {
                warn!(payment_id = %payment_id, reason = %reason, "Gateway facts rejected");
            }
            _ => {}
        }
        if let Some(settlement_id) = applied.record.settlement.settlement_id.as_deref() {
            if let Some(parked) = self.unattached.take(settlement_id).await? {
                info!(
                    settlement_id = %parked.settlement_id,
                    received_at = %parked.received_at,
                    "Resolved unattached settlement from gateway transfers"
                );
            }
        }

        self.monitoring.record_reconciliation(applied.outcome.as_str());
        info!(
            payment_id = %payment_id,
            outcome = applied.outcome.as_str(),
            partial = !snapshot.errors.is_empty(),
            "Reconciliation finished"
        );

        Ok(ReconciliationResult {
            updated: applied.updated(),
            outcome: applied.outcome.as_str().to_string(),
            record: applied.record,
            snapshot,
        })
    }

    /// Query all three resources. Transfer and refund entries may omit their
    /// currency, so when the record does not know it yet the payment is
    /// fetched first and its currency is used for the other two.
    async fn fetch_all(
        &self,
        payment_id: &str,
        known_currency: Option<&str>,
    ) -> (GatewayResult<Payment>, GatewayResult<Vec<Settlement>>, GatewayResult<Vec<Refund>>) {
        match known_currency {
            Some(currency) => tokio::join!(
                self.gateway.fetch_payment(payment_id),
                self.gateway.fetch_transfers(payment_id, Some(currency)),
                self.gateway.fetch_refunds(payment_id, Some(currency)),
            ),
            None => {
                let payment = self.gateway.fetch_payment(payment_id).await;
                let currency = payment.as_ref().ok().map(|p| p.currency.as_str());
                let (transfers, refunds) = tokio::join!(
                    self.gateway.fetch_transfers(payment_id, currency),
                    self.gateway.fetch_refunds(payment_id, currency),
                );
                (payment, transfers, refunds)
            }
        }
    }
}

fn first_unauthorized<'a>(errors: [Option<&'a GatewayError>; 3]) -> Option<&'a GatewayError> {
    errors
        .into_iter()
        .flatten()
        .find(|e| matches!(e, GatewayError::Unauthorized(_)))
}

fn is_unavailable<T>(result: &GatewayResult<T>) -> bool {
    matches!(result, Err(GatewayError::Unavailable(_)) | Err(GatewayError::Protocol(_)))
}

fn all_unavailable(
    payment: &GatewayResult<Payment>,
    transfers: &GatewayResult<Vec<Settlement>>,
    refunds: &GatewayResult<Vec<Refund>>,
) -> bool {
    is_unavailable(payment) && is_unavailable(transfers) && is_unavailable(refunds)
}

fn note_failure(snapshot: &mut GatewaySnapshot, operation: &str, error: GatewayError) {
    warn!(operation = %operation, error = %error, "Gateway query failed, continuing with partial facts");
    snapshot.errors.insert(operation.to_string(), error.to_string());
}
