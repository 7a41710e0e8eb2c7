//! Infrastructure adapters module
//!
//! This module contains adapters for the payment gateway, storage and
//! other infrastructure concerns.

pub mod authentication;
pub mod gateway_client;
pub mod monitoring;
pub mod order_store;
pub mod unattached_settlements;

// Re-export all adapters
pub use authentication::{AuthenticationAdapter, JwtClaims};
pub use gateway_client::HttpGatewayClient;
pub use monitoring::MonitoringAdapter;
pub use order_store::{InMemoryOrderStore, RedisOrderStore};
pub use unattached_settlements::{InMemoryUnattachedSettlements, RedisUnattachedSettlements};
