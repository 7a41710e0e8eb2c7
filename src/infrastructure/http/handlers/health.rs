//! Health check handler module

use crate::{
    application::use_cases::HealthCheckUseCase,
    infrastructure::http::responses::ResponseFormatter,
};
use std::sync::Arc;
use warp::http::StatusCode;

/// Handle health check requests
pub async fn handle_health_request(
    health_use_case: Arc<HealthCheckUseCase>,
) -> Result<warp::reply::Response, warp::Rejection> {
    match health_use_case.execute().await {
        Ok(health) => Ok(ResponseFormatter::json(&health, StatusCode::OK)),
        Err(e) => Ok(ResponseFormatter::from_app_error(&e)),
    }
}
