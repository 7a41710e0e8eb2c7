//! Application services - Orchestration of domain logic

pub mod fact_applier;
pub mod reconciliation_service;
pub mod webhook_service;

pub use fact_applier::{ApplyOutcome, FactApplier};
pub use reconciliation_service::{GatewaySnapshot, ReconciliationResult, ReconciliationService};
pub use webhook_service::{WebhookAck, WebhookService};
