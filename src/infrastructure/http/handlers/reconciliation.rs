//! Reconciliation query handler

use std::sync::Arc;

use warp::http::StatusCode;

use crate::application::services::ReconciliationService;
use crate::infrastructure::adapters::AuthenticationAdapter;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::logging::LoggingUtils;

/// Reconcile one order against the gateway on behalf of an internal caller
pub async fn handle_reconciliation_request(
    order_id: String,
    authorization: Option<String>,
    auth: Arc<AuthenticationAdapter>,
    service: Arc<ReconciliationService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let request_id = LoggingUtils::generate_request_id();

    if let Err(e) = auth.validate_bearer(authorization.as_deref()) {
        LoggingUtils::log_security_event("reconciliation_auth_failed", &format!("request_id={}", request_id));
        return Ok(ResponseFormatter::from_app_error(&e));
    }

    match service.reconcile(&order_id).await {
        Ok(result) => Ok(ResponseFormatter::json(&result, StatusCode::OK)),
        Err(e) => {
            LoggingUtils::log_error(&request_id, "reconcile", &e);
            Ok(ResponseFormatter::from_app_error(&e))
        }
    }
}
