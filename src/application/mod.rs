//! Application layer - Use cases and application services
//!
//! This module contains application services that orchestrate domain logic:
//! webhook intake, the reconciliation poller and the shared apply loop.

pub mod services;
pub mod use_cases;

pub use services::*;
pub use use_cases::*;
