//! Domain layer - Core reconciliation logic and domain models
//!
//! Everything in here is independent of HTTP, Redis and the gateway's wire
//! format. The merge function and signature check are pure.

pub mod events;
pub mod health;
pub mod money;
pub mod order;
pub mod payments;
pub mod ports;
pub mod reconciliation;
pub mod signature;

pub use events::{classify, GatewayEvent};
pub use health::{HealthResponse, HealthStatus};
pub use order::{Order, OrderPaymentRecord, RefundRecord, SettlementRecord};
pub use payments::{
    Payment, PaymentStatus, Refund, RefundStatus, Settlement, SettlementStatus, UnattachedSettlement,
};
pub use ports::{
    GatewayError, GatewayResult, OrderRepository, PaymentGateway, UnattachedSettlementRepository,
    WriteOutcome,
};
pub use reconciliation::{
    merge, FactSource, MergeOutcome, MergeResult, PartialPaymentFacts, PaymentFacts, SettlementFacts,
};
