//! Prometheus exposition handler

use crate::{
    infrastructure::adapters::MonitoringAdapter,
    infrastructure::http::responses::ResponseFormatter,
};
use std::sync::Arc;

/// Handle Prometheus metrics requests
pub async fn handle_prometheus_request(
    monitoring: Arc<MonitoringAdapter>,
) -> Result<warp::reply::Response, warp::Rejection> {
    match monitoring.get_prometheus_metrics() {
        Ok(text) => Ok(ResponseFormatter::text(text, "text/plain; version=0.0.4; charset=utf-8")),
        Err(e) => Ok(ResponseFormatter::from_app_error(&e)),
    }
}
