use std::time::Duration;

use async_trait::async_trait;
use common::{Actor, CustomerId, IdempotencyKey, OrderId, VariantId};

use crate::plan::CheckoutPlan;
use crate::records::{
    AttemptGate, ConfirmationOutcome, DonationRecord, InventoryTransactionKind,
    InventoryTransactionRecord, OrderRecord, OrderStatus, PointTransactionRecord, ProductRecord,
    RewardRecord, VariantRecord,
};
use crate::Result;

/// Core trait for commerce store implementations.
///
/// Every method is atomic on its own: callers never see a half-applied
/// write. The checkout unit of work is a single method
/// ([`commit_checkout`](Self::commit_checkout)) rather than an exposed
/// transaction handle, so the in-memory and PostgreSQL implementations
/// stay interchangeable. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait CommerceStore: Send + Sync {
    // -- Catalog --

    /// Inserts a product.
    async fn insert_product(&self, product: ProductRecord) -> Result<()>;

    /// Inserts a variant. A non-zero initial stock is recorded as a
    /// Restock ledger row by `Actor::System`, so the ledger-sum
    /// invariant holds from the first write.
    async fn insert_variant(&self, variant: VariantRecord) -> Result<()>;

    /// Retrieves a variant by ID. Returns None if it doesn't exist.
    async fn get_variant(&self, variant_id: VariantId) -> Result<Option<VariantRecord>>;

    /// Lists all variants.
    async fn list_variants(&self) -> Result<Vec<VariantRecord>>;

    // -- Idempotency guard --

    /// Checks and locks an idempotency key for one checkout attempt.
    ///
    /// State machine per key: Fresh -> InFlight -> Completed (terminal),
    /// or Fresh -> InFlight -> Failed -> Fresh. An InFlight key older
    /// than `lease` is reclaimed as if Failed, so a crash mid-commit
    /// never blocks retries permanently.
    ///
    /// Fails with `KeyReuse` if the stored request fingerprint does not
    /// match `fingerprint`.
    async fn begin_attempt(
        &self,
        key: &IdempotencyKey,
        fingerprint: &str,
        lease: Duration,
    ) -> Result<AttemptGate>;

    /// Releases a key after a failed attempt so the caller may retry.
    async fn fail_attempt(&self, key: &IdempotencyKey) -> Result<()>;

    // -- Checkout unit of work --

    /// Applies a checkout plan as one all-or-nothing unit of work.
    ///
    /// Re-checks stock for every line under a per-variant lock; if any
    /// line would drive stock negative the whole plan is rejected with
    /// `StockConflict` and nothing is written. On success the
    /// idempotency key is marked Completed in the same commit.
    async fn commit_checkout(&self, plan: CheckoutPlan) -> Result<OrderRecord>;

    // -- Inventory ledger --

    /// Applies a signed stock delta and appends the matching ledger row
    /// in one unit of work. Rejects deltas that would drive stock
    /// negative. Used for admin restock/adjustment and for
    /// reservation holds; Sale rows are only ever written by
    /// [`commit_checkout`](Self::commit_checkout).
    async fn adjust_stock(
        &self,
        variant_id: VariantId,
        delta: i64,
        kind: InventoryTransactionKind,
        order_id: Option<OrderId>,
        actor: Actor,
        note: Option<String>,
    ) -> Result<VariantRecord>;

    /// Places a temporary hold of `quantity` units, appending a negative
    /// Reservation ledger row. Fails with `StockConflict` when fewer
    /// than `quantity` units remain.
    async fn reserve_stock(
        &self,
        variant_id: VariantId,
        quantity: u32,
        order_id: Option<OrderId>,
        actor: Actor,
    ) -> Result<VariantRecord> {
        self.adjust_stock(
            variant_id,
            -i64::from(quantity),
            InventoryTransactionKind::Reservation,
            order_id,
            actor,
            None,
        )
        .await
    }

    /// Returns a previous hold of `quantity` units to stock, appending a
    /// positive Reservation ledger row.
    async fn release_stock(
        &self,
        variant_id: VariantId,
        quantity: u32,
        order_id: Option<OrderId>,
        actor: Actor,
    ) -> Result<VariantRecord> {
        self.adjust_stock(
            variant_id,
            i64::from(quantity),
            InventoryTransactionKind::Reservation,
            order_id,
            actor,
            None,
        )
        .await
    }

    /// Lists the ledger rows for a variant, oldest first.
    async fn ledger_entries(&self, variant_id: VariantId)
        -> Result<Vec<InventoryTransactionRecord>>;

    /// Sums the ledger for a variant. Equals the stock counter unless
    /// the store has drifted.
    async fn ledger_sum(&self, variant_id: VariantId) -> Result<i64>;

    // -- Payment confirmation --

    /// Correlates an external payment reference onto a pending order,
    /// deduplicated by the external event ID. Replays return
    /// `Duplicate` without touching the order. First application also
    /// moves the order Pending -> Processing.
    async fn record_confirmation(
        &self,
        event_id: &str,
        order_id: OrderId,
        payment_ref: &str,
    ) -> Result<ConfirmationOutcome>;

    // -- Orders --

    /// Retrieves an order with its items. Returns None if it doesn't exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Lists a customer's orders, newest first.
    async fn list_orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<OrderRecord>>;

    /// Advances an order's status, enforcing the lifecycle rules.
    /// Sets `shipped_at`/`delivered_at` exactly once.
    async fn advance_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderRecord>;

    // -- Rewards & donations --

    /// Retrieves a customer's reward counters.
    async fn get_reward(&self, customer_id: CustomerId) -> Result<Option<RewardRecord>>;

    /// Lists a customer's point transactions, oldest first.
    async fn point_history(&self, customer_id: CustomerId) -> Result<Vec<PointTransactionRecord>>;

    /// Retrieves the donation pledge for an order.
    async fn get_donation(&self, order_id: OrderId) -> Result<Option<DonationRecord>>;
}
