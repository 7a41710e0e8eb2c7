//! Use cases - Entry points that do not need a full service

pub mod health_check;

pub use health_check::HealthCheckUseCase;
