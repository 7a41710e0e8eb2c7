//! Route builder module
//!
//! This module contains the main route builder that orchestrates the creation
//! of all application routes.

use crate::infrastructure::http::routes::{HealthRoutes, MetricsRoutes, ReconciliationRoutes, WebhookRoutes};
use crate::infrastructure::http::server::AppServices;
use warp::Filter;

/// Route builder that orchestrates the creation of all application routes
pub struct RouteBuilder;

impl RouteBuilder {
    /// Build all application routes
    pub fn build_routes(
        max_request_size: usize,
        services: &AppServices,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let webhook_route = WebhookRoutes::create_gateway_route(max_request_size, services.webhook.clone());

        let reconciliation_route = ReconciliationRoutes::create_reconciliation_route(
            services.auth.clone(),
            services.reconciliation.clone(),
        );

        let health_route = HealthRoutes::create_health_route(services.health.clone());

        let prometheus_route = MetricsRoutes::create_prometheus_route(services.monitoring.clone());

        webhook_route
            .or(reconciliation_route)
            .or(health_route)
            .or(prometheus_route)
    }
}
