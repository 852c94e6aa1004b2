use common::VariantId;
use order_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the checkout layer.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request failed validation before touching the store.
    #[error("invalid checkout request: {0}")]
    Validation(String),

    /// One cart line asked for more units than are on hand.
    #[error(
        "insufficient stock for variant {variant_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        variant_id: VariantId,
        requested: i64,
        available: i64,
    },

    /// Another request holding the same idempotency key is still running.
    #[error("a checkout with this idempotency key is already in flight")]
    DuplicateInFlight,

    /// The external gateway rejected or failed a call.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Storage-layer failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StockConflict {
                variant_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                variant_id,
                requested,
                available,
            },
            other => CheckoutError::Store(other),
        }
    }
}
