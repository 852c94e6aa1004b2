//! The order assembler.
//!
//! Takes a validated cart, claims the idempotency key, builds an
//! authoritative [`CheckoutPlan`] from catalog prices, and hands it to
//! the store as one atomic unit of work. Everything after the commit
//! (notification, gateway forwarding) is best-effort and never rolls
//! the order back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Money, OrderId};
use metrics::{counter, histogram};
use order_store::{AttemptGate, CheckoutPlan, CommerceStore, OrderRecord, PlannedLine, StoreError};

use crate::cart::CheckoutRequest;
use crate::conservation;
use crate::error::CheckoutError;
use crate::gateway::PaymentGateway;
use crate::notifier::Notifier;
use crate::rewards;

/// Tunable checkout policy.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Share of the subtotal pledged to conservation.
    pub donation_percent: u32,
    /// Region the pledge is earmarked for.
    pub donation_region: String,
    /// Points awarded to registered customers per order.
    pub points_per_order: i64,
    /// How long an in-flight idempotency key blocks retries.
    pub attempt_lease: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            donation_percent: conservation::DEFAULT_DONATION_PERCENT,
            donation_region: conservation::DEFAULT_REGION.to_string(),
            points_per_order: rewards::POINTS_PER_ORDER,
            attempt_lease: Duration::from_secs(30),
        }
    }
}

/// Result of a checkout call.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// A new order was committed.
    Created {
        order: OrderRecord,
        /// Lines whose claimed price differed from the catalog price.
        price_warnings: Vec<String>,
    },
    /// The idempotency key had already completed; this is the original
    /// order, and nothing was written.
    Replayed { order: OrderRecord },
}

impl CheckoutOutcome {
    /// The committed or replayed order.
    pub fn order(&self) -> &OrderRecord {
        match self {
            CheckoutOutcome::Created { order, .. } => order,
            CheckoutOutcome::Replayed { order } => order,
        }
    }

    /// Returns true if this was an idempotent replay.
    pub fn is_replay(&self) -> bool {
        matches!(self, CheckoutOutcome::Replayed { .. })
    }

    /// Price-mismatch warnings, empty on replays.
    pub fn price_warnings(&self) -> &[String] {
        match self {
            CheckoutOutcome::Created { price_warnings, .. } => price_warnings,
            CheckoutOutcome::Replayed { .. } => &[],
        }
    }
}

/// Service for assembling and committing orders.
pub struct CheckoutService<S: CommerceStore> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: CheckoutConfig,
}

impl<S: CommerceStore> CheckoutService<S> {
    /// Creates a checkout service with default policy.
    pub fn new(store: Arc<S>, gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(store, gateway, notifier, CheckoutConfig::default())
    }

    /// Creates a checkout service with explicit policy.
    pub fn with_config(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Processes a checkout request end to end.
    ///
    /// Retrying with the same idempotency key and cart returns the
    /// original order as [`CheckoutOutcome::Replayed`]. A retry while
    /// the first attempt is still running fails with
    /// [`CheckoutError::DuplicateInFlight`].
    #[tracing::instrument(skip(self, request), fields(key = %request.idempotency_key))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        let started = Instant::now();
        counter!("checkout_attempts_total").increment(1);

        request.validate()?;
        let fingerprint = request.fingerprint();

        let gate = self
            .store
            .begin_attempt(&request.idempotency_key, &fingerprint, self.config.attempt_lease)
            .await?;

        match gate {
            AttemptGate::Completed(order_id) => {
                let order = self
                    .store
                    .get_order(order_id)
                    .await?
                    .ok_or(CheckoutError::Store(StoreError::OrderNotFound(order_id)))?;
                tracing::info!(order_id = %order_id, "checkout replayed");
                Ok(CheckoutOutcome::Replayed { order })
            }
            AttemptGate::InFlight => Err(CheckoutError::DuplicateInFlight),
            AttemptGate::Fresh => match self.assemble_and_commit(&request, fingerprint).await {
                Ok(outcome) => {
                    counter!("checkout_completed").increment(1);
                    histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
                    Ok(outcome)
                }
                Err(e) => {
                    counter!("checkout_failed").increment(1);
                    if let Err(release_err) = self.store.fail_attempt(&request.idempotency_key).await
                    {
                        tracing::warn!(error = %release_err, "failed to release idempotency key");
                    }
                    Err(e)
                }
            },
        }
    }

    async fn assemble_and_commit(
        &self,
        request: &CheckoutRequest,
        fingerprint: String,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let mut price_warnings = Vec::new();
        let mut lines = Vec::with_capacity(request.lines.len());

        for line in &request.lines {
            let variant = self
                .store
                .get_variant(line.variant_id)
                .await?
                .ok_or(CheckoutError::Store(StoreError::VariantNotFound(
                    line.variant_id,
                )))?;

            // Early availability check; the commit re-checks under lock.
            if variant.stock < line.quantity as i64 {
                return Err(CheckoutError::InsufficientStock {
                    variant_id: line.variant_id,
                    requested: line.quantity as i64,
                    available: variant.stock,
                });
            }

            if let Some(claimed) = line.unit_price_claimed
                && claimed != variant.price
            {
                price_warnings.push(format!(
                    "price for {} changed from {} to {}",
                    variant.sku, claimed, variant.price
                ));
            }

            lines.push(PlannedLine {
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: variant.price,
            });
        }

        let subtotal: Money = lines.iter().map(|l| l.line_total()).sum();
        let total = subtotal + request.shipping + request.tax;

        let percent = request
            .donation_percent
            .unwrap_or(self.config.donation_percent);
        let donation = conservation::pledge_for(subtotal, percent, &self.config.donation_region);

        let order_id = OrderId::new();
        let reward = rewards::accrual_for(request.customer, order_id, self.config.points_per_order);

        let plan = CheckoutPlan {
            order_id,
            placed_by: request.customer,
            customer_email: request.customer_email.clone(),
            lines,
            subtotal,
            shipping: request.shipping,
            tax: request.tax,
            total,
            shipping_address: request.shipping_address.clone(),
            donation,
            reward,
            idempotency_key: request.idempotency_key.clone(),
            fingerprint,
        };

        let order = self.store.commit_checkout(plan).await?;
        tracing::info!(order_id = %order.id, total = %order.total, "order committed");

        // Post-commit side effects are best-effort.
        if let Err(e) = self.notifier.order_placed(&order).await {
            tracing::warn!(order_id = %order.id, error = %e, "order-placed notification failed");
        }
        match self.gateway.forward_order(&order).await {
            Ok(gateway_ref) => {
                tracing::info!(order_id = %order.id, reference = %gateway_ref.reference, "order forwarded to gateway");
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "gateway forwarding failed; order stays pending");
            }
        }

        Ok(CheckoutOutcome::Created {
            order,
            price_warnings,
        })
    }
}
