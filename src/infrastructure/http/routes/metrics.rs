//! Metrics routes module

use crate::{
    infrastructure::adapters::MonitoringAdapter,
    infrastructure::http::{handlers::handle_prometheus_request, utils::with_monitoring_adapter},
};
use std::sync::Arc;
use warp::Filter;

/// Metrics routes configuration
pub struct MetricsRoutes;

impl MetricsRoutes {
    /// Create the Prometheus metrics endpoint route
    pub fn create_prometheus_route(
        monitoring: Arc<MonitoringAdapter>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_monitoring_adapter(monitoring))
            .and_then(handle_prometheus_request)
    }
}
