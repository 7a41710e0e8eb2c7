//! Settlement Reconciler - payment capture and settlement reconciliation
//!
//! Keeps the payment record embedded on each order consistent with the
//! payment gateway. Facts arrive from signed webhooks and from an on-demand
//! poller; both go through one monotonic merge, so the record converges
//! whatever order the facts arrive in.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;


pub use config::AppConfig;
pub use infrastructure::http::HttpServer;
pub use shared::error::{AppError, AppResult};

/// Application result type
pub type Result<T> = std::result::Result<T, shared::error::AppError>;
