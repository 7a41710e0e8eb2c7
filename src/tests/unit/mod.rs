//! Unit tests for the application services
//!
//! Services run over the in-memory stores and the scripted gateway; nothing
//! here touches the network.

use crate::{
    application::services::{FactApplier, WebhookAck},
    domain::{
        events::classify,
        payments::{PaymentStatus, SettlementStatus},
        ports::{GatewayError, OrderRepository, UnattachedSettlementRepository},
        reconciliation::{MergeOutcome, PartialPaymentFacts},
    },
    shared::error::AppError,
    tests::{
        common::{ConflictingOrderStore, StaleSettlementIndexStore, TestHarness, UnreachableOrderStore},
        fixtures,
    },
};
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;

fn facts(body: &Value) -> PartialPaymentFacts {
    classify(body, "INR").unwrap().to_facts().unwrap()
}

async fn deliver(harness: &TestHarness, body: &Value) -> Result<WebhookAck, AppError> {
    let (raw, signature) = harness.signed(body);
    harness.services.webhook.handle("req_test", &raw, Some(&signature)).await
}

mod fact_applier {
    use super::*;
    use crate::domain::order::{Order, OrderPaymentRecord};

    #[tokio::test]
    async fn test_apply_writes_and_bumps_version() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let applier = FactApplier::new(harness.orders.clone(), 3);

        let applied = applier.apply("ord_1", &facts(&fixtures::payment_captured("pay_1", 50000, 1000))).await.unwrap();

        assert!(applied.updated());
        assert_eq!(applied.version, 1);
        assert!(harness.order("ord_1").await.payment.is_paid);
    }

    #[tokio::test]
    async fn test_converged_merge_is_not_written() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let applier = FactApplier::new(harness.orders.clone(), 3);
        let captured = facts(&fixtures::payment_captured("pay_1", 50000, 1000));

        applier.apply("ord_1", &captured).await.unwrap();
        let again = applier.apply("ord_1", &captured).await.unwrap();

        assert_eq!(again.outcome, MergeOutcome::Converged);
        assert!(!again.updated());
        assert_eq!(harness.order("ord_1").await.version, 1);
    }

    #[tokio::test]
    async fn test_version_conflict_is_retried() {
        let store = Arc::new(ConflictingOrderStore::new(2));
        store.insert(Order::new("ord_1", OrderPaymentRecord::for_payment("pay_1"))).await.unwrap();
        let applier = FactApplier::new(store.clone(), 3);

        let applied = applier.apply("ord_1", &facts(&fixtures::payment_authorized("pay_1"))).await.unwrap();

        assert!(applied.updated());
        assert_eq!(store.cas_calls(), 3);
        let stored = store.get("ord_1").await.unwrap().unwrap();
        assert_eq!(stored.payment.payment_status, PaymentStatus::Authorized);
    }

    #[tokio::test]
    async fn test_persistent_conflict_gives_up() {
        let store = Arc::new(ConflictingOrderStore::new(100));
        store.insert(Order::new("ord_1", OrderPaymentRecord::for_payment("pay_1"))).await.unwrap();
        let applier = FactApplier::new(store.clone(), 3);

        let result = applier.apply("ord_1", &facts(&fixtures::payment_authorized("pay_1"))).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(store.cas_calls(), 4);
        assert_eq!(store.get("ord_1").await.unwrap().unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let harness = TestHarness::new();
        let applier = FactApplier::new(harness.orders.clone(), 3);
        let result = applier.apply("missing", &facts(&fixtures::payment_authorized("pay_1"))).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_payment_has_no_order() {
        let harness = TestHarness::new();
        let applier = FactApplier::new(harness.orders.clone(), 3);
        let result = applier.apply_by_payment(&facts(&fixtures::payment_authorized("pay_x"))).await.unwrap();
        assert!(result.is_none());
    }
}

mod webhook_service {
    use super::*;

    #[tokio::test]
    async fn test_capture_is_merged() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;

        let ack = deliver(&harness, &fixtures::payment_captured("pay_1", 50000, 1000)).await.unwrap();

        assert_eq!(ack, WebhookAck::Processed);
        let record = harness.order("ord_1").await.payment;
        assert!(record.is_paid);
        assert_eq!(record.payment_status, PaymentStatus::Captured);
        assert_eq!(record.amount, Some(dec!(500.00)));
        assert_eq!(record.fee, Some(dec!(10.00)));
        assert_eq!(
            harness.services.monitoring.webhook_count("payment.captured", "processed"),
            1
        );
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected_without_processing() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let (raw, _) = harness.signed(&fixtures::payment_captured("pay_1", 50000, 1000));

        let result = harness.services.webhook.handle("req_test", &raw, Some("deadbeef")).await;
        assert_eq!(result, Err(AppError::SignatureInvalid));

        let missing = harness.services.webhook.handle("req_test", &raw, None).await;
        assert_eq!(missing, Err(AppError::SignatureInvalid));
        assert_eq!(harness.order("ord_1").await.version, 0);
    }

    #[tokio::test]
    async fn test_signature_covers_exact_bytes() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let body = fixtures::payment_captured("pay_1", 50000, 1000);
        let (_, signature) = harness.signed(&body);
        let reformatted = serde_json::to_vec_pretty(&body).unwrap();

        let result = harness.services.webhook.handle("req_test", &reformatted, Some(&signature)).await;
        assert_eq!(result, Err(AppError::SignatureInvalid));
    }

    #[tokio::test]
    async fn test_signed_garbage_is_a_json_error() {
        let harness = TestHarness::new();
        let raw = b"{not json".to_vec();
        let signature = crate::domain::signature::sign(&raw, &harness.config.webhook.secret);

        let result = harness.services.webhook.handle("req_test", &raw, Some(&signature)).await;
        assert!(matches!(result, Err(AppError::Json(_))));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_acknowledged() {
        let harness = TestHarness::new();
        let body = serde_json::json!({ "event": "order.paid", "payload": {} });

        assert_eq!(deliver(&harness, &body).await.unwrap(), WebhookAck::Ignored);
        assert_eq!(harness.services.monitoring.webhook_count("unknown", "ignored"), 1);
    }

    #[tokio::test]
    async fn test_malformed_known_kind_is_acknowledged_not_merged() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let body = serde_json::json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": { "id": "pay_1", "currency": "INR" } } }
        });

        assert_eq!(deliver(&harness, &body).await.unwrap(), WebhookAck::Malformed);
        assert_eq!(harness.order("ord_1").await.version, 0);
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_malformed() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;

        let ack = deliver(&harness, &fixtures::payment_captured("pay_1", 0, 0)).await.unwrap();

        assert_eq!(ack, WebhookAck::Malformed);
        assert_eq!(harness.order("ord_1").await.version, 0);
    }

    #[tokio::test]
    async fn test_payment_without_order_is_ignored() {
        let harness = TestHarness::new();
        let ack = deliver(&harness, &fixtures::payment_authorized("pay_orphan")).await.unwrap();
        assert_eq!(ack, WebhookAck::Ignored);
    }

    #[tokio::test]
    async fn test_redelivery_does_not_write_again() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let body = fixtures::payment_captured("pay_1", 50000, 1000);

        assert_eq!(deliver(&harness, &body).await.unwrap(), WebhookAck::Processed);
        assert_eq!(deliver(&harness, &body).await.unwrap(), WebhookAck::Processed);

        assert_eq!(harness.order("ord_1").await.version, 1);
    }

    #[tokio::test]
    async fn test_late_failure_does_not_regress_capture() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;

        deliver(&harness, &fixtures::payment_captured("pay_1", 50000, 1000)).await.unwrap();
        deliver(&harness, &fixtures::payment_failed("pay_1", "payment_timed_out")).await.unwrap();

        let record = harness.order("ord_1").await.payment;
        assert_eq!(record.payment_status, PaymentStatus::Captured);
        assert!(record.is_paid);
        assert_eq!(record.failure_reason, None);
    }

    #[tokio::test]
    async fn test_settlement_before_transfer_is_resolved() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;

        let parked = deliver(&harness, &fixtures::settlement_processed("setl_1", 49000)).await.unwrap();
        assert_eq!(parked, WebhookAck::Unattached);
        assert_eq!(harness.unattached.list().await.unwrap().len(), 1);

        let linked = deliver(&harness, &fixtures::transfer_processed("trf_1", "pay_1", 49000, Some("setl_1")))
            .await
            .unwrap();
        assert_eq!(linked, WebhookAck::Processed);
        assert!(harness.unattached.list().await.unwrap().is_empty());

        let settlement = harness.order("ord_1").await.payment.settlement;
        assert_eq!(settlement.status, SettlementStatus::Transferred);
        assert_eq!(settlement.settlement_id.as_deref(), Some("setl_1"));
        assert_eq!(settlement.amount_transferred, Some(dec!(490.00)));
        assert_eq!(settlement.transferred_at, Some(fixtures::at(fixtures::TRANSFERRED_AT)));
    }

    #[tokio::test]
    async fn test_settlement_after_transfer_attaches_directly() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;

        deliver(&harness, &fixtures::transfer_processed("trf_1", "pay_1", 49000, Some("setl_1")))
            .await
            .unwrap();
        let ack = deliver(&harness, &fixtures::settlement_processed("setl_1", 49000)).await.unwrap();

        assert_eq!(ack, WebhookAck::Processed);
        assert!(harness.unattached.list().await.unwrap().is_empty());
        assert_eq!(harness.order("ord_1").await.version, 1);
    }

    #[tokio::test]
    async fn test_transfer_linked_while_parking_releases_settlement() {
        // The first settlement lookup misses the link a concurrent transfer just wrote
        let harness = TestHarness::with_orders(Arc::new(StaleSettlementIndexStore::new(1)));
        harness.seed_order("ord_1", Some("pay_1")).await;
        deliver(&harness, &fixtures::transfer_processed("trf_1", "pay_1", 49000, Some("setl_1")))
            .await
            .unwrap();

        let ack = deliver(&harness, &fixtures::settlement_processed("setl_1", 49000)).await.unwrap();

        assert_eq!(ack, WebhookAck::Processed);
        assert!(harness.unattached.list().await.unwrap().is_empty());
        let settlement = harness.order("ord_1").await.payment.settlement;
        assert_eq!(settlement.settlement_id.as_deref(), Some("setl_1"));
    }

    #[tokio::test]
    async fn test_non_positive_settlement_is_not_parked() {
        let harness = TestHarness::new();

        let ack = deliver(&harness, &fixtures::settlement_processed("setl_1", 0)).await.unwrap();

        assert_eq!(ack, WebhookAck::Malformed);
        assert!(harness.unattached.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_batch_spans_orders() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        harness.seed_order("ord_2", Some("pay_2")).await;

        for (transfer_id, payment_id) in [("trf_1", "pay_1"), ("trf_2", "pay_2")] {
            let ack = deliver(&harness, &fixtures::transfer_processed(transfer_id, payment_id, 49000, Some("setl_1")))
                .await
                .unwrap();
            assert_eq!(ack, WebhookAck::Processed);
        }

        for order_id in ["ord_1", "ord_2"] {
            let settlement = harness.order(order_id).await.payment.settlement;
            assert_eq!(settlement.settlement_id.as_deref(), Some("setl_1"));
        }
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let harness = TestHarness::with_orders(Arc::new(UnreachableOrderStore));
        let result = deliver(&harness, &fixtures::payment_authorized("pay_1")).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}

mod reconciliation_service {
    use super::*;

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let harness = TestHarness::new();
        let result = harness.services.reconciliation.reconcile("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(harness.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_order_without_payment_is_not_queried() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", None).await;

        let result = harness.services.reconciliation.reconcile("ord_1").await.unwrap();

        assert!(!result.updated);
        assert_eq!(result.outcome, "nothing_to_reconcile");
        assert_eq!(harness.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_webhook_then_poll_converges() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        deliver(&harness, &fixtures::payment_captured("pay_1", 50000, 1000)).await.unwrap();

        harness.gateway.set_payment(Ok(fixtures::captured_payment("pay_1"))).await;
        harness.gateway.set_transfers(Ok(vec![fixtures::transferred("trf_1", "pay_1")])).await;

        let first = harness.services.reconciliation.reconcile("ord_1").await.unwrap();
        assert!(first.updated);
        assert!(first.record.is_paid);
        assert_eq!(first.record.amount, Some(dec!(500.00)));
        assert_eq!(first.record.fee, Some(dec!(10.00)));
        assert_eq!(first.record.settlement.status, SettlementStatus::Transferred);
        assert_eq!(first.record.settlement.amount_transferred, Some(dec!(490.00)));
        assert_eq!(harness.gateway.calls(), 3);

        let second = harness.services.reconciliation.reconcile("ord_1").await.unwrap();
        assert!(!second.updated);
        assert_eq!(second.outcome, "converged");
        assert_eq!(harness.order("ord_1").await.version, 2);
    }

    #[tokio::test]
    async fn test_partial_availability_merges_what_succeeded() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        harness.gateway.set_payment(Ok(fixtures::captured_payment("pay_1"))).await;
        harness
            .gateway
            .set_transfers(Err(GatewayError::Unavailable("timeout".into())))
            .await;
        harness
            .gateway
            .set_refunds(Ok(vec![fixtures::processed_refund("rfnd_1", "pay_1", 5000)]))
            .await;

        let result = harness.services.reconciliation.reconcile("ord_1").await.unwrap();

        assert!(result.updated);
        assert!(result.record.is_paid);
        assert_eq!(result.record.settlement.status, SettlementStatus::None);
        assert_eq!(result.record.refunds.len(), 1);
        assert!(result.snapshot.errors.contains_key("fetch_transfers"));
        assert!(result.snapshot.transfers.is_none());
    }

    #[tokio::test]
    async fn test_all_unavailable_writes_nothing() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        harness.gateway.fail_all(GatewayError::Unavailable("503".into())).await;

        let result = harness.services.reconciliation.reconcile("ord_1").await;

        assert!(matches!(result, Err(AppError::GatewayUnavailable(_))));
        assert_eq!(harness.order("ord_1").await.version, 0);
        assert_eq!(harness.services.monitoring.reconciliation_count("gateway_unavailable"), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_gateway_is_fatal() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        harness.gateway.set_payment(Ok(fixtures::captured_payment("pay_1"))).await;
        harness
            .gateway
            .set_refunds(Err(GatewayError::Unauthorized("401".into())))
            .await;

        let result = harness.services.reconciliation.reconcile("ord_1").await;

        assert!(matches!(result, Err(AppError::GatewayUnauthorized(_))));
        assert_eq!(harness.order("ord_1").await.version, 0);
        assert_eq!(harness.services.monitoring.reconciliation_count("gateway_unauthorized"), 1);
    }

    #[tokio::test]
    async fn test_poll_releases_parked_settlement() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let parked = deliver(&harness, &fixtures::settlement_processed("setl_1", 49000)).await.unwrap();
        assert_eq!(parked, WebhookAck::Unattached);

        let mut transfer = fixtures::transferred("trf_1", "pay_1");
        transfer.settlement_id = Some("setl_1".to_string());
        harness.gateway.set_payment(Ok(fixtures::captured_payment("pay_1"))).await;
        harness.gateway.set_transfers(Ok(vec![transfer])).await;

        let result = harness.services.reconciliation.reconcile("ord_1").await.unwrap();

        assert!(result.updated);
        assert_eq!(result.record.settlement.settlement_id.as_deref(), Some("setl_1"));
        assert!(harness.unattached.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_currency_is_taken_from_the_payment() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        let mut payment = fixtures::captured_payment("pay_1");
        payment.currency = "JPY".to_string();
        harness.gateway.set_payment(Ok(payment)).await;

        harness.services.reconciliation.reconcile("ord_1").await.unwrap();

        assert_eq!(
            harness.gateway.currency_hints().await,
            vec![Some("JPY".to_string()), Some("JPY".to_string())]
        );
    }

    #[tokio::test]
    async fn test_known_currency_is_passed_through() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;
        deliver(&harness, &fixtures::payment_captured("pay_1", 50000, 1000)).await.unwrap();

        harness.services.reconciliation.reconcile("ord_1").await.unwrap();

        assert_eq!(
            harness.gateway.currency_hints().await,
            vec![Some("INR".to_string()), Some("INR".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unknown_gateway_payment_changes_nothing() {
        let harness = TestHarness::new();
        harness.seed_order("ord_1", Some("pay_1")).await;

        let result = harness.services.reconciliation.reconcile("ord_1").await.unwrap();

        assert!(!result.updated);
        assert!(result.snapshot.errors.contains_key("fetch_payment"));
        assert_eq!(harness.order("ord_1").await.version, 0);
    }
}
