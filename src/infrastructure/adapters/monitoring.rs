//! Monitoring adapter for metrics and observability
//!
//! This adapter owns the Prometheus registry and the reconciliation counters.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::domain::ports::GatewayError;
use crate::shared::error::{AppError, AppResult};

/// Adapter for monitoring and metrics services
pub struct MonitoringAdapter {
    prometheus_registry: Registry,
    webhook_events: IntCounterVec,
    reconciliations: IntCounterVec,
    gateway_requests: IntCounterVec,
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> AppResult<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|e| AppError::Internal(format!("Failed to create metric {}: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| AppError::Internal(format!("Failed to register metric {}: {}", name, e)))?;
    Ok(counter)
}

impl MonitoringAdapter {
    /// Create a new monitoring adapter with its own registry
    pub fn new() -> AppResult<Self> {
        let registry = Registry::new();

        let webhook_events = counter(
            &registry,
            "webhook_events_total",
            "Webhook deliveries by event kind and outcome",
            &["kind", "outcome"],
        )?;
        let reconciliations = counter(
            &registry,
            "reconciliations_total",
            "Poller runs by outcome",
            &["outcome"],
        )?;
        let gateway_requests = counter(
            &registry,
            "gateway_requests_total",
            "Gateway queries by operation and outcome",
            &["operation", "outcome"],
        )?;

        Ok(Self {
            prometheus_registry: registry,
            webhook_events,
            reconciliations,
            gateway_requests,
        })
    }

    pub fn record_webhook(&self, kind: &str, outcome: &str) {
        self.webhook_events.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_reconciliation(&self, outcome: &str) {
        self.reconciliations.with_label_values(&[outcome]).inc();
    }

    /// Record one gateway query; `result` is only inspected, not consumed
    pub fn record_gateway_request<T>(&self, operation: &str, result: &Result<T, GatewayError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(GatewayError::NotFound) => "not_found",
            Err(GatewayError::Unavailable(_)) => "unavailable",
            Err(GatewayError::Unauthorized(_)) => "unauthorized",
            Err(GatewayError::Protocol(_)) => "protocol_error",
        };
        self.gateway_requests.with_label_values(&[operation, outcome]).inc();
    }

    pub fn webhook_count(&self, kind: &str, outcome: &str) -> u64 {
        self.webhook_events.with_label_values(&[kind, outcome]).get()
    }

    pub fn reconciliation_count(&self, outcome: &str) -> u64 {
        self.reconciliations.with_label_values(&[outcome]).get()
    }

    /// Get Prometheus metrics in text format
    pub fn get_prometheus_metrics(&self) -> AppResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.prometheus_registry.gather(), &mut buffer)
            .map_err(|e| {
                warn!(error = %e, "Failed to encode metrics");
                AppError::Internal(format!("Failed to encode metrics: {}", e))
            })?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("Metrics are not UTF-8: {}", e)))
    }
}
