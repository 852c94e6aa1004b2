//! The write-set for one checkout unit of work.
//!
//! A [`CheckoutPlan`] is assembled by the checkout service from
//! server-side prices and handed to [`CommerceStore::commit_checkout`]
//! as a single all-or-nothing batch.
//!
//! [`CommerceStore::commit_checkout`]: crate::store::CommerceStore::commit_checkout

use common::{Actor, CustomerId, IdempotencyKey, Money, OrderId, VariantId};

use crate::records::ShippingAddress;

/// One cart line with its authoritative unit price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Server-side price at assembly time, never the client's claim.
    pub unit_price: Money,
}

impl PlannedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Conservation pledge to persist with the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDonation {
    pub amount: Money,
    pub percent: u32,
    pub region: String,
}

/// Reward accrual for a registered customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReward {
    pub customer_id: CustomerId,
    pub points: i64,
    pub description: String,
}

/// Everything one committed checkout writes.
///
/// The store implementation must apply the whole plan, or none of it:
/// order header and items, one Sale ledger row plus stock decrement per
/// line, the donation row, the optional reward accrual, and the
/// idempotency-key completion all land in the same unit of work.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub order_id: OrderId,
    pub placed_by: Actor,
    pub customer_email: String,
    pub lines: Vec<PlannedLine>,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub shipping_address: ShippingAddress,
    pub donation: PlannedDonation,
    pub reward: Option<PlannedReward>,
    pub idempotency_key: IdempotencyKey,
    pub fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_line_total() {
        let line = PlannedLine {
            variant_id: VariantId::new(),
            quantity: 4,
            unit_price: Money::from_cents(500),
        };
        assert_eq!(line.line_total().cents(), 2000);
    }
}
