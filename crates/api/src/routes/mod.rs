//! Route handlers and shared application state.

use std::sync::Arc;

use checkout::{CheckoutService, ConfirmationService};
use order_store::CommerceStore;

pub mod health;
pub mod metrics;
pub mod orders;
pub mod rewards;
pub mod variants;
pub mod webhooks;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CommerceStore> {
    pub store: Arc<S>,
    pub checkout: CheckoutService<S>,
    pub confirmations: ConfirmationService<S>,
}
