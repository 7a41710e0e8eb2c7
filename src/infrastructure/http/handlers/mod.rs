//! HTTP route handlers module
//!
//! One handler per endpoint. Handlers translate errors into responses and
//! never reject, so every failure carries a JSON body.

pub mod health;
pub mod metrics;
pub mod reconciliation;
pub mod webhooks;

pub use health::handle_health_request;
pub use metrics::handle_prometheus_request;
pub use reconciliation::handle_reconciliation_request;
pub use webhooks::handle_gateway_webhook;
