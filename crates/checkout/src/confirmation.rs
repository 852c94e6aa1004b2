//! Payment confirmation application.
//!
//! External systems (POS, payment processor) deliver confirmation
//! events at-least-once. The store deduplicates by event id; this
//! service layers metrics and the confirmation notification on top.

use std::sync::Arc;

use common::OrderId;
use metrics::counter;
use order_store::{CommerceStore, ConfirmationOutcome};

use crate::error::CheckoutError;
use crate::notifier::Notifier;

/// Applies payment confirmations onto pending orders.
pub struct ConfirmationService<S: CommerceStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: CommerceStore> ConfirmationService<S> {
    /// Creates a new confirmation service.
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Applies one confirmation event.
    ///
    /// Replays (same event id, or same payment reference under a new
    /// event id) return [`ConfirmationOutcome::Duplicate`] and change
    /// nothing; callers should treat them as success.
    #[tracing::instrument(skip(self))]
    pub async fn apply(
        &self,
        event_id: &str,
        order_id: OrderId,
        payment_ref: &str,
    ) -> Result<ConfirmationOutcome, CheckoutError> {
        let outcome = self
            .store
            .record_confirmation(event_id, order_id, payment_ref)
            .await?;

        match &outcome {
            ConfirmationOutcome::Applied(order) => {
                tracing::info!(order_id = %order.id, payment_ref, "payment confirmed");
                if let Err(e) = self.notifier.order_confirmed(order).await {
                    tracing::warn!(order_id = %order.id, error = %e, "confirmation notification failed");
                }
            }
            ConfirmationOutcome::Duplicate(order) => {
                counter!("webhook_replays_total").increment(1);
                tracing::info!(order_id = %order.id, event_id, "duplicate confirmation ignored");
            }
        }

        Ok(outcome)
    }
}
