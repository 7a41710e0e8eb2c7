//! Ports implemented by infrastructure adapters

use async_trait::async_trait;
use thiserror::Error;

use super::order::{Order, OrderPaymentRecord};
use super::payments::{Payment, Refund, Settlement, UnattachedSettlement};
use crate::shared::error::{AppError, AppResult};

/// Failure of a single gateway query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("resource not found")]
    NotFound,

    /// Timeout, transport failure or 5xx; retry later
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected; needs operator attention
    #[error("gateway rejected credentials: {0}")]
    Unauthorized(String),

    /// The gateway answered with something we could not interpret
    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound => AppError::NotFound("gateway resource".into()),
            GatewayError::Unavailable(msg) => AppError::GatewayUnavailable(msg),
            GatewayError::Unauthorized(msg) => AppError::GatewayUnauthorized(msg),
            GatewayError::Protocol(msg) => AppError::GatewayUnavailable(msg),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Read-only view of the payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_payment(&self, payment_id: &str) -> GatewayResult<Payment>;

    /// `currency` scales entries that omit their own currency; `None` means
    /// the adapter's configured default.
    async fn fetch_transfers(&self, source_payment_id: &str, currency: Option<&str>) -> GatewayResult<Vec<Settlement>>;

    async fn fetch_refunds(&self, payment_id: &str, currency: Option<&str>) -> GatewayResult<Vec<Refund>>;
}

/// Result of a conditional write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written(Order),
    /// The stored version moved since it was read
    VersionConflict,
}

/// Persistence for orders and their embedded payment record
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order; fails if the id or its payment id is already taken
    async fn insert(&self, order: Order) -> AppResult<Order>;

    async fn get(&self, order_id: &str) -> AppResult<Option<Order>>;

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>>;

    async fn find_by_settlement_id(&self, settlement_id: &str) -> AppResult<Option<Order>>;

    /// Replace the payment record only if the stored version equals `expected_version`
    async fn compare_and_swap(
        &self,
        order_id: &str,
        expected_version: u64,
        payment: OrderPaymentRecord,
    ) -> AppResult<WriteOutcome>;

    /// Cheap connectivity probe for health checks
    async fn ping(&self) -> AppResult<()>;
}

/// Settlements seen before the payment they belong to is known
#[async_trait]
pub trait UnattachedSettlementRepository: Send + Sync {
    async fn put(&self, settlement: UnattachedSettlement) -> AppResult<()>;

    /// Remove and return the settlement, if present
    async fn take(&self, settlement_id: &str) -> AppResult<Option<UnattachedSettlement>>;

    async fn list(&self) -> AppResult<Vec<UnattachedSettlement>>;
}
