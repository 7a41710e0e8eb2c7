//! Common test utilities and mock implementations
//!
//! This module provides the scripted gateway, store wrappers and the harness
//! used across all test modules.

use crate::{
    config::AppConfig,
    domain::{
        order::{Order, OrderPaymentRecord},
        payments::{Payment, Refund, Settlement},
        ports::{GatewayError, GatewayResult, OrderRepository, PaymentGateway, WriteOutcome},
        signature,
    },
    infrastructure::{
        adapters::{InMemoryOrderStore, InMemoryUnattachedSettlements, JwtClaims},
        http::{AppServices, HttpServer},
    },
    shared::error::{AppError, AppResult},
    tests::config,
};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Gateway whose three answers are scripted per test
pub struct FakeGateway {
    payment: Mutex<GatewayResult<Payment>>,
    transfers: Mutex<GatewayResult<Vec<Settlement>>>,
    refunds: Mutex<GatewayResult<Vec<Refund>>>,
    calls: AtomicU32,
    currency_hints: Mutex<Vec<Option<String>>>,
}

impl FakeGateway {
    /// Unknown payment, no transfers, no refunds
    pub fn new() -> Self {
        Self {
            payment: Mutex::new(Err(GatewayError::NotFound)),
            transfers: Mutex::new(Ok(Vec::new())),
            refunds: Mutex::new(Ok(Vec::new())),
            calls: AtomicU32::new(0),
            currency_hints: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_payment(&self, result: GatewayResult<Payment>) {
        *self.payment.lock().await = result;
    }

    pub async fn set_transfers(&self, result: GatewayResult<Vec<Settlement>>) {
        *self.transfers.lock().await = result;
    }

    pub async fn set_refunds(&self, result: GatewayResult<Vec<Refund>>) {
        *self.refunds.lock().await = result;
    }

    /// Make every query fail the same way
    pub async fn fail_all(&self, error: GatewayError) {
        self.set_payment(Err(error.clone())).await;
        self.set_transfers(Err(error.clone())).await;
        self.set_refunds(Err(error)).await;
    }

    /// Total queries made across all three operations
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Currencies passed to the transfer and refund queries, in call order
    pub async fn currency_hints(&self) -> Vec<Option<String>> {
        self.currency_hints.lock().await.clone()
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn fetch_payment(&self, _payment_id: &str) -> GatewayResult<Payment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payment.lock().await.clone()
    }

    async fn fetch_transfers(&self, _source_payment_id: &str, currency: Option<&str>) -> GatewayResult<Vec<Settlement>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.currency_hints.lock().await.push(currency.map(str::to_string));
        self.transfers.lock().await.clone()
    }

    async fn fetch_refunds(&self, _payment_id: &str, currency: Option<&str>) -> GatewayResult<Vec<Refund>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.currency_hints.lock().await.push(currency.map(str::to_string));
        self.refunds.lock().await.clone()
    }
}

/// Store that loses the first `conflicts` conditional writes
pub struct ConflictingOrderStore {
    inner: InMemoryOrderStore,
    conflicts_left: AtomicU32,
    cas_calls: AtomicU32,
}

impl ConflictingOrderStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            conflicts_left: AtomicU32::new(conflicts),
            cas_calls: AtomicU32::new(0),
        }
    }

    pub fn cas_calls(&self) -> u32 {
        self.cas_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderRepository for ConflictingOrderStore {
    async fn insert(&self, order: Order) -> AppResult<Order> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        self.inner.get(order_id).await
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
        self.inner.find_by_payment_id(payment_id).await
    }

    async fn find_by_settlement_id(&self, settlement_id: &str) -> AppResult<Option<Order>> {
        self.inner.find_by_settlement_id(settlement_id).await
    }

    async fn compare_and_swap(
        &self,
        order_id: &str,
        expected_version: u64,
        payment: OrderPaymentRecord,
    ) -> AppResult<WriteOutcome> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        let lose = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lose {
            return Ok(WriteOutcome::VersionConflict);
        }
        self.inner.compare_and_swap(order_id, expected_version, payment).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}

/// Store whose first `stale` settlement lookups miss, as if a concurrent
/// writer linked the settlement right after the read
pub struct StaleSettlementIndexStore {
    inner: InMemoryOrderStore,
    stale_left: AtomicU32,
}

impl StaleSettlementIndexStore {
    pub fn new(stale: u32) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            stale_left: AtomicU32::new(stale),
        }
    }
}

#[async_trait]
impl OrderRepository for StaleSettlementIndexStore {
    async fn insert(&self, order: Order) -> AppResult<Order> {
        self.inner.insert(order).await
    }

    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        self.inner.get(order_id).await
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
        self.inner.find_by_payment_id(payment_id).await
    }

    async fn find_by_settlement_id(&self, settlement_id: &str) -> AppResult<Option<Order>> {
        let stale = self
            .stale_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        self.inner.find_by_settlement_id(settlement_id).await
    }

    async fn compare_and_swap(
        &self,
        order_id: &str,
        expected_version: u64,
        payment: OrderPaymentRecord,
    ) -> AppResult<WriteOutcome> {
        self.inner.compare_and_swap(order_id, expected_version, payment).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }
}

/// Store whose every call fails as if the backend were down
pub struct UnreachableOrderStore;

#[async_trait]
impl OrderRepository for UnreachableOrderStore {
    async fn insert(&self, _order: Order) -> AppResult<Order> {
        Err(AppError::Storage("connection refused".into()))
    }

    async fn get(&self, _order_id: &str) -> AppResult<Option<Order>> {
        Err(AppError::Storage("connection refused".into()))
    }

    async fn find_by_payment_id(&self, _payment_id: &str) -> AppResult<Option<Order>> {
        Err(AppError::Storage("connection refused".into()))
    }

    async fn find_by_settlement_id(&self, _settlement_id: &str) -> AppResult<Option<Order>> {
        Err(AppError::Storage("connection refused".into()))
    }

    async fn compare_and_swap(&self, _: &str, _: u64, _: OrderPaymentRecord) -> AppResult<WriteOutcome> {
        Err(AppError::Storage("connection refused".into()))
    }

    async fn ping(&self) -> AppResult<()> {
        Err(AppError::Storage("connection refused".into()))
    }
}

/// Services wired over in-memory stores and a fake gateway
pub struct TestHarness {
    pub config: AppConfig,
    pub orders: Arc<dyn OrderRepository>,
    pub unattached: Arc<InMemoryUnattachedSettlements>,
    pub gateway: Arc<FakeGateway>,
    pub services: AppServices,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_orders(Arc::new(InMemoryOrderStore::new()))
    }

    pub fn with_orders(orders: Arc<dyn OrderRepository>) -> Self {
        config::init();
        let config = config::test_config();
        let unattached = Arc::new(InMemoryUnattachedSettlements::new());
        let gateway = Arc::new(FakeGateway::new());
        let services = AppServices::assemble(&config, orders.clone(), unattached.clone(), gateway.clone())
            .expect("test services");
        Self { config, orders, unattached, gateway, services }
    }

    /// Insert an order, optionally already linked to a gateway payment
    pub async fn seed_order(&self, order_id: &str, payment_id: Option<&str>) -> Order {
        let record = payment_id.map(OrderPaymentRecord::for_payment).unwrap_or_default();
        self.orders.insert(Order::new(order_id, record)).await.expect("seed order")
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.orders.get(order_id).await.expect("store").expect("order exists")
    }

    pub fn server(&self) -> HttpServer {
        HttpServer::with_services(self.config.clone(), self.services.clone())
    }

    /// Serialize and sign a webhook body with the configured secret
    pub fn signed(&self, body: &Value) -> (Vec<u8>, String) {
        let raw = serde_json::to_vec(body).expect("serialize body");
        let signature = signature::sign(&raw, &self.config.webhook.secret);
        (raw, signature)
    }

    /// `Authorization` header value for the reconciliation endpoint
    pub fn bearer(&self) -> String {
        let jwt = &self.config.security.jwt;
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            sub: "storefront-worker".to_string(),
            iss: jwt.issuer.clone(),
            aud: jwt.audience.clone(),
            iat: now as usize,
            exp: (now + 300) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(jwt.secret_key.as_bytes()),
        )
        .expect("encode jwt");
        format!("Bearer {}", token)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
