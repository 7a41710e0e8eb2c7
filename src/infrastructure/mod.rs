//! Infrastructure layer - External concerns and adapters
//!
//! This module contains the gateway client, storage backends, JWT
//! validation, metrics and HTTP handling.

pub mod adapters;
pub mod http;

// Re-export main adapters
pub use adapters::{AuthenticationAdapter, HttpGatewayClient, InMemoryOrderStore, MonitoringAdapter, RedisOrderStore};
