//! Persistent record types for the order-fulfillment core.
//!
//! Order items, donations, and ledger rows are financial snapshots:
//! immutable after the creating unit of work commits. Only order status
//! and its lifecycle timestamps change afterwards.

use chrono::{DateTime, Utc};
use common::{Actor, CustomerId, Money, OrderId, ProductId, VariantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the given transition is allowed.
    ///
    /// Status moves strictly forward; cancellation is only possible
    /// before shipping begins.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Database/text representation.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parses the database/text representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSING" => Some(OrderStatus::Processing),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable shipping address snapshot taken at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// An order header with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    /// Guest or registered shopper. Never `Actor::System`.
    pub placed_by: Actor,
    pub customer_email: String,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub shipping_address: ShippingAddress,
    /// External payment/POS reference, set once by the confirmation callback.
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemRecord>,
}

/// A line item belonging to exactly one order.
///
/// `unit_price` is the authoritative price at purchase time and does not
/// follow later price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItemRecord {
    /// Line total (quantity x unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A product, grouping one or more purchasable variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
}

/// A purchasable SKU-level unit with a finite stock counter.
///
/// `stock` is the single source of truth for availability and is only
/// ever mutated together with an appended inventory transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub stock: i64,
}

/// Type of a stock-affecting transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryTransactionKind {
    /// Checkout decrement; quantity is always negative.
    Sale,
    /// Admin stock intake; quantity is positive.
    Restock,
    /// Admin correction; either sign.
    Adjustment,
    /// Temporary hold correlated to an order; either sign.
    Reservation,
}

impl InventoryTransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InventoryTransactionKind::Sale => "SALE",
            InventoryTransactionKind::Restock => "RESTOCK",
            InventoryTransactionKind::Adjustment => "ADJUSTMENT",
            InventoryTransactionKind::Reservation => "RESERVATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SALE" => Some(InventoryTransactionKind::Sale),
            "RESTOCK" => Some(InventoryTransactionKind::Restock),
            "ADJUSTMENT" => Some(InventoryTransactionKind::Adjustment),
            "RESERVATION" => Some(InventoryTransactionKind::Reservation),
            _ => None,
        }
    }
}

/// Append-only ledger row. The sum of `quantity` over a variant's rows
/// equals its current stock counter at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransactionRecord {
    pub id: Uuid,
    pub variant_id: VariantId,
    /// Signed delta applied to the stock counter.
    pub quantity: i64,
    pub kind: InventoryTransactionKind,
    pub order_id: Option<OrderId>,
    pub actor: Actor,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Settlement state of a conservation pledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pledged,
    /// Terminal; set by the out-of-core reconciliation process.
    Donated,
}

impl DonationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DonationStatus::Pledged => "PLEDGED",
            DonationStatus::Donated => "DONATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLEDGED" => Some(DonationStatus::Pledged),
            "DONATED" => Some(DonationStatus::Donated),
            _ => None,
        }
    }
}

/// Conservation donation pledge, one per order, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub amount: Money,
    pub percent: u32,
    pub region: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

/// Materialized reward counters for a registered customer.
///
/// `points` mirrors the sum of point transactions; `total_spent` and
/// `total_orders` are monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub customer_id: CustomerId,
    pub points: i64,
    pub total_spent: Money,
    pub total_orders: i64,
    pub updated_at: DateTime<Utc>,
}

/// Type of a point-affecting transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointTransactionKind {
    Purchase,
    Redemption,
    Adjustment,
}

impl PointTransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PointTransactionKind::Purchase => "PURCHASE",
            PointTransactionKind::Redemption => "REDEMPTION",
            PointTransactionKind::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PURCHASE" => Some(PointTransactionKind::Purchase),
            "REDEMPTION" => Some(PointTransactionKind::Redemption),
            "ADJUSTMENT" => Some(PointTransactionKind::Adjustment),
            _ => None,
        }
    }
}

/// Append-only point ledger row, mirroring the inventory ledger pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTransactionRecord {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub points: i64,
    pub kind: PointTransactionKind,
    pub description: String,
    /// Always set when kind is `Purchase`.
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

/// State of an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptState {
    InFlight,
    Completed,
    Failed,
}

impl AttemptState {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptState::InFlight => "IN_FLIGHT",
            AttemptState::Completed => "COMPLETED",
            AttemptState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_FLIGHT" => Some(AttemptState::InFlight),
            "COMPLETED" => Some(AttemptState::Completed),
            "FAILED" => Some(AttemptState::Failed),
            _ => None,
        }
    }
}

/// Outcome of an idempotency check-and-lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptGate {
    /// No prior attempt (or a failed/expired one); the key is now locked.
    Fresh,
    /// Another request holds the key within its lease; retry later.
    InFlight,
    /// A prior attempt already committed this order.
    Completed(OrderId),
}

/// Outcome of recording an external payment confirmation.
#[derive(Debug, Clone)]
pub enum ConfirmationOutcome {
    /// First delivery of this event; the order was updated.
    Applied(OrderRecord),
    /// Replay of an already-processed event; nothing changed.
    Duplicate(OrderRecord),
}

impl ConfirmationOutcome {
    /// The order after (or unaffected by) the confirmation.
    pub fn order(&self) -> &OrderRecord {
        match self {
            ConfirmationOutcome::Applied(order) | ConfirmationOutcome::Duplicate(order) => order,
        }
    }

    /// Returns true for a replayed event.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ConfirmationOutcome::Duplicate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_strictly_forward() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn cancellation_only_before_shipping() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn status_text_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("UNKNOWN"), None);
    }

    #[test]
    fn line_total() {
        let item = OrderItemRecord {
            id: Uuid::new_v4(),
            order_id: OrderId::new(),
            variant_id: VariantId::new(),
            quantity: 3,
            unit_price: Money::from_cents(1250),
        };
        assert_eq!(item.line_total().cents(), 3750);
    }
}
