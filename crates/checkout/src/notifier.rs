//! Customer notification boundary.
//!
//! Delivery (email, SMS) is out of scope; the core only signals that an
//! order was placed or confirmed. Failures here never roll back a
//! committed order.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use order_store::OrderRecord;

use crate::error::CheckoutError;

/// Trait for customer-facing notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Signals that an order was placed.
    async fn order_placed(&self, order: &OrderRecord) -> Result<(), CheckoutError>;

    /// Signals that payment was confirmed for an order.
    async fn order_confirmed(&self, order: &OrderRecord) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    placed: Vec<(OrderId, String)>,
    confirmed: Vec<OrderId>,
    fail_on_notify: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail on the next call.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.state.write().unwrap().fail_on_notify = fail;
    }

    /// Returns the number of placed-order notifications.
    pub fn placed_count(&self) -> usize {
        self.state.read().unwrap().placed.len()
    }

    /// Returns true if a placed notification went to the given address.
    pub fn notified(&self, order_id: OrderId, email: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .placed
            .iter()
            .any(|(id, addr)| *id == order_id && addr == email)
    }

    /// Returns the number of confirmation notifications.
    pub fn confirmed_count(&self) -> usize {
        self.state.read().unwrap().confirmed.len()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn order_placed(&self, order: &OrderRecord) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_notify {
            return Err(CheckoutError::Gateway("notifier unavailable".to_string()));
        }
        state.placed.push((order.id, order.customer_email.clone()));
        Ok(())
    }

    async fn order_confirmed(&self, order: &OrderRecord) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_notify {
            return Err(CheckoutError::Gateway("notifier unavailable".to_string()));
        }
        state.confirmed.push(order.id);
        Ok(())
    }
}
