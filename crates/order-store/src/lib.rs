//! Storage layer for the order-fulfillment core.
//!
//! Exposes the [`CommerceStore`] trait whose methods are the only
//! unit-of-work boundaries in the system, along with an in-memory
//! implementation for tests and a PostgreSQL implementation for
//! production.

pub mod error;
pub mod memory;
pub mod plan;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use plan::{CheckoutPlan, PlannedDonation, PlannedLine, PlannedReward};
pub use postgres::PostgresStore;
pub use records::{
    AttemptGate, AttemptState, ConfirmationOutcome, DonationRecord, DonationStatus,
    InventoryTransactionKind, InventoryTransactionRecord, OrderItemRecord, OrderRecord,
    OrderStatus, PointTransactionKind, PointTransactionRecord, ProductRecord, RewardRecord,
    ShippingAddress, VariantRecord,
};
pub use store::CommerceStore;
