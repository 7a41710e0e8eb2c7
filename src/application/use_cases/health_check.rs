use crate::{
    domain::{health::*, ports::OrderRepository},
    shared::error::AppResult,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Health check use case
pub struct HealthCheckUseCase {
    orders: Arc<dyn OrderRepository>,
    started_at: Instant,
}

impl HealthCheckUseCase {
    /// Create a new health check use case
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self {
            orders,
            started_at: Instant::now(),
        }
    }

    /// Report liveness plus store reachability. The gateway is not probed.
    pub async fn execute(&self) -> AppResult<HealthResponse> {
        let mut status = HealthStatus::Healthy;
        let mut details = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "uptime": self.get_uptime(),
        });

        match self.orders.ping().await {
            Ok(()) => details["store"] = json!({ "status": "connected" }),
            Err(e) => {
                tracing::warn!(error = %e, "Order store health probe failed");
                status = HealthStatus::Degraded;
                details["store"] = json!({ "status": "disconnected" });
            }
        }

        Ok(HealthResponse::new(status, details))
    }

    fn get_uptime(&self) -> String {
        let secs = self.started_at.elapsed().as_secs();
        format!("{}d {}h {}m", secs / 86400, (secs % 86400) / 3600, (secs % 3600) / 60)
    }
}
