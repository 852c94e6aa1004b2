//! Rewards accrual policy.
//!
//! Registered customers earn a fixed number of points per completed
//! order. The accrual is written in the same unit of work as the order
//! itself, so a customer's balance never reflects a phantom purchase.
//! Redemption is out of scope here; the ledger admits negative rows
//! for it.

use common::{Actor, OrderId};
use order_store::PlannedReward;

/// Points granted per completed order.
pub const POINTS_PER_ORDER: i64 = 4;

/// Human-facing description on the point transaction.
pub fn purchase_description(order_id: OrderId) -> String {
    format!("Purchase #{}", order_id.short())
}

/// Builds the reward accrual for an order, if the purchaser earns one.
/// Guests accrue nothing.
pub fn accrual_for(placed_by: Actor, order_id: OrderId, points: i64) -> Option<PlannedReward> {
    placed_by.customer_id().map(|customer_id| PlannedReward {
        customer_id,
        points,
        description: purchase_description(order_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CustomerId;

    #[test]
    fn registered_customer_earns_points() {
        let customer_id = CustomerId::new();
        let order_id = OrderId::new();

        let reward =
            accrual_for(Actor::Registered(customer_id), order_id, POINTS_PER_ORDER).unwrap();
        assert_eq!(reward.customer_id, customer_id);
        assert_eq!(reward.points, 4);
        assert_eq!(reward.description, format!("Purchase #{}", order_id.short()));
    }

    #[test]
    fn guest_earns_nothing() {
        assert!(accrual_for(Actor::Guest, OrderId::new(), POINTS_PER_ORDER).is_none());
        assert!(accrual_for(Actor::System, OrderId::new(), POINTS_PER_ORDER).is_none());
    }

    #[test]
    fn description_uses_short_order_id() {
        let order_id = OrderId::new();
        let description = purchase_description(order_id);
        assert!(description.starts_with("Purchase #"));
        assert_eq!(description.len(), "Purchase #".len() + 8);
    }
}
