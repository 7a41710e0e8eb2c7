//! HTTP utilities - Common helper functions
//!
//! Filters that inject shared services into routes.

use crate::application::services::{ReconciliationService, WebhookService};
use crate::application::use_cases::HealthCheckUseCase;
use crate::infrastructure::adapters::{AuthenticationAdapter, MonitoringAdapter};
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

/// Helper function to inject the webhook service into route
pub fn with_webhook_service(
    service: Arc<WebhookService>,
) -> impl Filter<Extract = (Arc<WebhookService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// Helper function to inject the reconciliation service into route
pub fn with_reconciliation_service(
    service: Arc<ReconciliationService>,
) -> impl Filter<Extract = (Arc<ReconciliationService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// Helper function to inject the authentication adapter into route
pub fn with_auth_adapter(
    auth: Arc<AuthenticationAdapter>,
) -> impl Filter<Extract = (Arc<AuthenticationAdapter>,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}

/// Helper function to inject health use case into route
pub fn with_health_use_case(
    health_use_case: Arc<HealthCheckUseCase>,
) -> impl Filter<Extract = (Arc<HealthCheckUseCase>,), Error = Infallible> + Clone {
    warp::any().map(move || health_use_case.clone())
}

/// Helper function to inject the monitoring adapter into route
pub fn with_monitoring_adapter(
    monitoring: Arc<MonitoringAdapter>,
) -> impl Filter<Extract = (Arc<MonitoringAdapter>,), Error = Infallible> + Clone {
    warp::any().map(move || monitoring.clone())
}
