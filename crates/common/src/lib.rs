//! Shared types for the order-fulfillment core.

pub mod types;

pub use types::{Actor, CustomerId, IdempotencyKey, Money, OrderId, ProductId, VariantId};
