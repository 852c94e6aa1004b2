//! Payment gateway adapter trait and in-memory implementation.
//!
//! The core never speaks the gateway protocol itself; it forwards a
//! committed order across this boundary and records the returned
//! reference when the confirmation webhook arrives later.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use order_store::OrderRecord;

use crate::error::CheckoutError;

/// Reference handed back by the gateway for a forwarded order.
#[derive(Debug, Clone)]
pub struct GatewayRef {
    pub reference: String,
}

/// Trait for the external payment/POS system boundary.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Forwards a committed order to the external system.
    async fn forward_order(&self, order: &OrderRecord) -> Result<GatewayRef, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    forwarded: Vec<(OrderId, String)>,
    next_id: u32,
    fail_on_forward: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail on the next forward call.
    pub fn set_fail_on_forward(&self, fail: bool) {
        self.state.write().unwrap().fail_on_forward = fail;
    }

    /// Returns the number of forwarded orders.
    pub fn forwarded_count(&self) -> usize {
        self.state.read().unwrap().forwarded.len()
    }

    /// Returns true if the given order was forwarded.
    pub fn has_forwarded(&self, order_id: OrderId) -> bool {
        self.state
            .read()
            .unwrap()
            .forwarded
            .iter()
            .any(|(id, _)| *id == order_id)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn forward_order(&self, order: &OrderRecord) -> Result<GatewayRef, CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_forward {
            return Err(CheckoutError::Gateway(
                "external system unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let reference = format!("POS-{:04}", state.next_id);
        state.forwarded.push((order.id, reference.clone()));

        Ok(GatewayRef { reference })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Actor, Money};
    use order_store::{OrderStatus, ShippingAddress};

    fn test_order() -> OrderRecord {
        OrderRecord {
            id: OrderId::new(),
            placed_by: Actor::Guest,
            customer_email: "shopper@example.com".to_string(),
            status: OrderStatus::Pending,
            subtotal: Money::from_cents(1000),
            shipping: Money::zero(),
            tax: Money::zero(),
            total: Money::from_cents(1000),
            shipping_address: ShippingAddress {
                name: "A Shopper".to_string(),
                line1: "1 Beach Rd".to_string(),
                line2: None,
                city: "South Padre Island".to_string(),
                state: "TX".to_string(),
                postal_code: "78597".to_string(),
                country: "US".to_string(),
            },
            payment_ref: None,
            created_at: Utc::now(),
            shipped_at: None,
            delivered_at: None,
            items: vec![],
        }
    }

    #[tokio::test]
    async fn forwards_with_sequential_references() {
        let gateway = InMemoryPaymentGateway::new();
        let order = test_order();

        let r1 = gateway.forward_order(&order).await.unwrap();
        let r2 = gateway.forward_order(&order).await.unwrap();

        assert_eq!(r1.reference, "POS-0001");
        assert_eq!(r2.reference, "POS-0002");
        assert_eq!(gateway.forwarded_count(), 2);
        assert!(gateway.has_forwarded(order.id));
    }

    #[tokio::test]
    async fn fail_toggle_rejects_forward() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_forward(true);

        let result = gateway.forward_order(&test_order()).await;
        assert!(matches!(result, Err(CheckoutError::Gateway(_))));
        assert_eq!(gateway.forwarded_count(), 0);
    }
}
