//! Reconciliation routes module

use crate::{
    application::services::ReconciliationService,
    infrastructure::adapters::AuthenticationAdapter,
    infrastructure::http::{
        handlers::handle_reconciliation_request,
        utils::{with_auth_adapter, with_reconciliation_service},
    },
};
use std::sync::Arc;
use warp::Filter;

/// Reconciliation routes configuration
pub struct ReconciliationRoutes;

impl ReconciliationRoutes {
    /// `GET /orders/{order_id}/reconciliation`
    pub fn create_reconciliation_route(
        auth: Arc<AuthenticationAdapter>,
        service: Arc<ReconciliationService>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("orders" / String / "reconciliation")
            .and(warp::get())
            .and(warp::header::optional::<String>("authorization"))
            .and(with_auth_adapter(auth))
            .and(with_reconciliation_service(service))
            .and_then(handle_reconciliation_request)
    }
}
