//! Gateway webhook handler

use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use warp::http::{HeaderMap, StatusCode};

use crate::application::services::WebhookService;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::logging::LoggingUtils;

/// Handle a webhook delivery. The body is taken as raw bytes so the
/// signature is checked over exactly what the gateway sent.
pub async fn handle_gateway_webhook(
    headers: HeaderMap,
    body: Bytes,
    service: Arc<WebhookService>,
) -> Result<warp::reply::Response, warp::Rejection> {
    let request_id = LoggingUtils::generate_request_id();
    let signature = headers
        .get(service.signature_header())
        .and_then(|value| value.to_str().ok());

    match service.handle(&request_id, &body, signature).await {
        Ok(ack) => Ok(ResponseFormatter::json(
            &json!({ "status": ack.as_str(), "request_id": request_id }),
            StatusCode::OK,
        )),
        Err(e) => {
            LoggingUtils::log_error(&request_id, "webhook", &e);
            Ok(ResponseFormatter::from_app_error(&e))
        }
    }
}
