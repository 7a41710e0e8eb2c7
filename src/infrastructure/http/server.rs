//! HTTP server implementation
//!
//! Wires stores, the gateway client and the application services together
//! and serves them with warp. TLS termination is left to the reverse proxy.

use crate::{
    application::{
        services::{FactApplier, ReconciliationService, WebhookService},
        use_cases::HealthCheckUseCase,
    },
    config::{AppConfig, StorageBackend},
    domain::ports::{OrderRepository, PaymentGateway, UnattachedSettlementRepository},
    infrastructure::adapters::{
        AuthenticationAdapter, HttpGatewayClient, InMemoryOrderStore, InMemoryUnattachedSettlements,
        MonitoringAdapter, RedisOrderStore, RedisUnattachedSettlements,
    },
    infrastructure::http::routes::RouteBuilder,
    shared::error::{AppError, AppResult},
};
use std::sync::Arc;
use tracing::{info, instrument};
use warp::{Filter, Reply};

/// Everything the routes need, built once at startup
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<dyn OrderRepository>,
    pub webhook: Arc<WebhookService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub health: Arc<HealthCheckUseCase>,
    pub auth: Arc<AuthenticationAdapter>,
    pub monitoring: Arc<MonitoringAdapter>,
}

impl AppServices {
    /// Assemble services over the given ports
    pub fn assemble(
        config: &AppConfig,
        orders: Arc<dyn OrderRepository>,
        unattached: Arc<dyn UnattachedSettlementRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> AppResult<Self> {
        let monitoring = Arc::new(MonitoringAdapter::new()?);
        let applier = Arc::new(FactApplier::new(
            orders.clone(),
            config.reconciliation.max_conflict_retries,
        ));

        let webhook = Arc::new(WebhookService::new(
            config.webhook.clone(),
            &config.gateway,
            applier.clone(),
            orders.clone(),
            unattached.clone(),
            monitoring.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            orders.clone(),
            gateway,
            applier,
            unattached,
            monitoring.clone(),
        ));

        Ok(Self {
            health: Arc::new(HealthCheckUseCase::new(orders.clone())),
            auth: Arc::new(AuthenticationAdapter::new(config.security.jwt.clone())),
            orders,
            webhook,
            reconciliation,
            monitoring,
        })
    }
}

/// HTTP server implementation
pub struct HttpServer {
    config: AppConfig,
    services: AppServices,
}

impl HttpServer {
    /// Create a server with the storage backend and gateway client from `config`
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let (orders, unattached): (Arc<dyn OrderRepository>, Arc<dyn UnattachedSettlementRepository>) =
            match config.storage.backend {
                StorageBackend::Memory => (
                    Arc::new(InMemoryOrderStore::new()),
                    Arc::new(InMemoryUnattachedSettlements::new()),
                ),
                StorageBackend::Redis => {
                    let client = redis::Client::open(config.storage.redis_url.as_str())
                        .map_err(|e| AppError::Config(format!("Invalid redis URL: {}", e)))?;
                    let manager = redis::aio::ConnectionManager::new(client).await?;
                    (
                        Arc::new(RedisOrderStore::new(manager.clone(), config.storage.key_prefix.clone())),
                        Arc::new(RedisUnattachedSettlements::new(manager, &config.storage.key_prefix)),
                    )
                }
            };
        info!(backend = ?config.storage.backend, "Storage initialized");

        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpGatewayClient::new(config.gateway.clone())?);
        let services = AppServices::assemble(&config, orders, unattached, gateway)?;

        Ok(Self { config, services })
    }

    /// Create a server over pre-built services
    pub fn with_services(config: AppConfig, services: AppServices) -> Self {
        Self { config, services }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the HTTP server until the process is stopped
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let addr: std::net::SocketAddr = self
            .config
            .server_address()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid server address: {}", e)))?;

        info!("Starting HTTP server on {}", addr);
        warp::serve(self.create_routes()).run(addr).await;

        Ok(())
    }

    /// Create the application routes
    pub fn create_routes(&self) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
        RouteBuilder::build_routes(self.config.server.max_request_size, &self.services)
    }
}
