use common::{IdempotencyKey, OrderId, VariantId};
use thiserror::Error;

use crate::records::OrderStatus;

/// Errors that can occur when interacting with the commerce store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The variant was not found.
    #[error("Variant not found: {0}")]
    VariantNotFound(VariantId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A stock decrement would exceed the available quantity.
    /// Carries the shortfall so the shopper can adjust the cart.
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    StockConflict {
        variant_id: VariantId,
        requested: i64,
        available: i64,
    },

    /// An idempotency key was reused with a different request fingerprint.
    #[error("Idempotency key {0} was reused for a different request")]
    KeyReuse(IdempotencyKey),

    /// The order already carries a different payment reference.
    #[error("Order {order_id} is already confirmed with a different payment reference")]
    AlreadyConfirmed { order_id: OrderId },

    /// An order status transition that the lifecycle does not allow.
    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
