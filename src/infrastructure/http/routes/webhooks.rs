//! Webhook routes module

use crate::{
    application::services::WebhookService,
    infrastructure::http::{handlers::handle_gateway_webhook, utils::with_webhook_service},
};
use std::sync::Arc;
use warp::Filter;

/// Webhook routes configuration
pub struct WebhookRoutes;

impl WebhookRoutes {
    /// `POST /webhooks/gateway` with the raw body
    pub fn create_gateway_route(
        max_request_size: usize,
        service: Arc<WebhookService>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("webhooks" / "gateway")
            .and(warp::post())
            .and(warp::header::headers_cloned())
            .and(warp::body::content_length_limit(max_request_size as u64))
            .and(warp::body::bytes())
            .and(with_webhook_service(service))
            .and_then(handle_gateway_webhook)
    }
}
