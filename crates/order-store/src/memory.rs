use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{Actor, CustomerId, IdempotencyKey, Money, OrderId, VariantId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::plan::CheckoutPlan;
use crate::records::{
    AttemptGate, AttemptState, ConfirmationOutcome, DonationRecord, DonationStatus,
    InventoryTransactionKind, InventoryTransactionRecord, OrderItemRecord, OrderRecord,
    OrderStatus, PointTransactionKind, PointTransactionRecord, ProductRecord, RewardRecord,
    VariantRecord,
};
use crate::store::CommerceStore;
use crate::{Result, StoreError};

#[derive(Debug, Clone)]
struct AttemptRow {
    fingerprint: String,
    state: AttemptState,
    order_id: Option<OrderId>,
    locked_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
struct Inner {
    products: HashMap<common::ProductId, ProductRecord>,
    variants: HashMap<VariantId, VariantRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    inventory_log: Vec<InventoryTransactionRecord>,
    donations: HashMap<OrderId, DonationRecord>,
    rewards: HashMap<CustomerId, RewardRecord>,
    point_log: Vec<PointTransactionRecord>,
    attempts: HashMap<String, AttemptRow>,
    confirmations: HashMap<String, OrderId>,
}

/// In-memory commerce store for tests and local development.
///
/// All tables live behind a single `RwLock`, so every trait method is
/// trivially atomic: a commit either applies the whole write-set under
/// the write guard or returns early having touched nothing.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of inventory ledger rows.
    pub async fn inventory_transaction_count(&self) -> usize {
        self.inner.read().await.inventory_log.len()
    }

    /// Returns the total number of orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }
}

fn append_inventory(
    inner: &mut Inner,
    variant_id: VariantId,
    quantity: i64,
    kind: InventoryTransactionKind,
    order_id: Option<OrderId>,
    actor: Actor,
    note: Option<String>,
) {
    inner.inventory_log.push(InventoryTransactionRecord {
        id: Uuid::new_v4(),
        variant_id,
        quantity,
        kind,
        order_id,
        actor,
        note,
        created_at: Utc::now(),
    });
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn insert_product(&self, product: ProductRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.products.insert(product.id, product);
        Ok(())
    }

    async fn insert_variant(&self, variant: VariantRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        if variant.stock > 0 {
            append_inventory(
                &mut inner,
                variant.id,
                variant.stock,
                InventoryTransactionKind::Restock,
                None,
                Actor::System,
                Some("Initial stock".to_string()),
            );
        }
        inner.variants.insert(variant.id, variant);
        Ok(())
    }

    async fn get_variant(&self, variant_id: VariantId) -> Result<Option<VariantRecord>> {
        Ok(self.inner.read().await.variants.get(&variant_id).cloned())
    }

    async fn list_variants(&self) -> Result<Vec<VariantRecord>> {
        let inner = self.inner.read().await;
        let mut variants: Vec<_> = inner.variants.values().cloned().collect();
        variants.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(variants)
    }

    async fn begin_attempt(
        &self,
        key: &IdempotencyKey,
        fingerprint: &str,
        lease: Duration,
    ) -> Result<AttemptGate> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        match inner.attempts.get_mut(key.as_str()) {
            None => {
                inner.attempts.insert(
                    key.as_str().to_string(),
                    AttemptRow {
                        fingerprint: fingerprint.to_string(),
                        state: AttemptState::InFlight,
                        order_id: None,
                        locked_at: now,
                    },
                );
                Ok(AttemptGate::Fresh)
            }
            Some(row) => {
                if row.fingerprint != fingerprint {
                    return Err(StoreError::KeyReuse(key.clone()));
                }
                match row.state {
                    AttemptState::Completed => {
                        let order_id = row
                            .order_id
                            .expect("completed attempt always has an order id");
                        Ok(AttemptGate::Completed(order_id))
                    }
                    AttemptState::Failed => {
                        row.state = AttemptState::InFlight;
                        row.locked_at = now;
                        Ok(AttemptGate::Fresh)
                    }
                    AttemptState::InFlight => {
                        let age = (now - row.locked_at)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        if age > lease {
                            // Lease expired: the holder crashed mid-commit.
                            row.locked_at = now;
                            Ok(AttemptGate::Fresh)
                        } else {
                            Ok(AttemptGate::InFlight)
                        }
                    }
                }
            }
        }
    }

    async fn fail_attempt(&self, key: &IdempotencyKey) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.attempts.get_mut(key.as_str()) {
            row.state = AttemptState::Failed;
        }
        Ok(())
    }

    async fn commit_checkout(&self, plan: CheckoutPlan) -> Result<OrderRecord> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        // Stock check for every line before any mutation; the write
        // guard serializes concurrent commits against the same variant.
        for line in &plan.lines {
            let variant = inner
                .variants
                .get(&line.variant_id)
                .ok_or(StoreError::VariantNotFound(line.variant_id))?;
            if variant.stock < line.quantity as i64 {
                return Err(StoreError::StockConflict {
                    variant_id: line.variant_id,
                    requested: line.quantity as i64,
                    available: variant.stock,
                });
            }
        }

        let note = format!("Order #{}", plan.order_id.short());
        for line in &plan.lines {
            let variant = inner
                .variants
                .get_mut(&line.variant_id)
                .expect("checked above");
            variant.stock -= line.quantity as i64;
            append_inventory(
                &mut inner,
                line.variant_id,
                -(line.quantity as i64),
                InventoryTransactionKind::Sale,
                Some(plan.order_id),
                plan.placed_by,
                Some(note.clone()),
            );
        }

        let items: Vec<OrderItemRecord> = plan
            .lines
            .iter()
            .map(|line| OrderItemRecord {
                id: Uuid::new_v4(),
                order_id: plan.order_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let order = OrderRecord {
            id: plan.order_id,
            placed_by: plan.placed_by,
            customer_email: plan.customer_email.clone(),
            status: OrderStatus::Pending,
            subtotal: plan.subtotal,
            shipping: plan.shipping,
            tax: plan.tax,
            total: plan.total,
            shipping_address: plan.shipping_address.clone(),
            payment_ref: None,
            created_at: now,
            shipped_at: None,
            delivered_at: None,
            items,
        };
        inner.orders.insert(plan.order_id, order.clone());

        inner.donations.insert(
            plan.order_id,
            DonationRecord {
                id: Uuid::new_v4(),
                order_id: plan.order_id,
                amount: plan.donation.amount,
                percent: plan.donation.percent,
                region: plan.donation.region.clone(),
                status: DonationStatus::Pledged,
                created_at: now,
            },
        );

        if let Some(reward) = &plan.reward {
            let entry = inner
                .rewards
                .entry(reward.customer_id)
                .or_insert_with(|| RewardRecord {
                    customer_id: reward.customer_id,
                    points: 0,
                    total_spent: Money::zero(),
                    total_orders: 0,
                    updated_at: now,
                });
            entry.points += reward.points;
            entry.total_spent += plan.total;
            entry.total_orders += 1;
            entry.updated_at = now;

            inner.point_log.push(PointTransactionRecord {
                id: Uuid::new_v4(),
                customer_id: reward.customer_id,
                points: reward.points,
                kind: PointTransactionKind::Purchase,
                description: reward.description.clone(),
                order_id: Some(plan.order_id),
                created_at: now,
            });
        }

        inner.attempts.insert(
            plan.idempotency_key.as_str().to_string(),
            AttemptRow {
                fingerprint: plan.fingerprint.clone(),
                state: AttemptState::Completed,
                order_id: Some(plan.order_id),
                locked_at: now,
            },
        );

        Ok(order)
    }

    async fn adjust_stock(
        &self,
        variant_id: VariantId,
        delta: i64,
        kind: InventoryTransactionKind,
        order_id: Option<OrderId>,
        actor: Actor,
        note: Option<String>,
    ) -> Result<VariantRecord> {
        let mut inner = self.inner.write().await;
        let variant = inner
            .variants
            .get(&variant_id)
            .ok_or(StoreError::VariantNotFound(variant_id))?;

        let new_stock = variant.stock + delta;
        if new_stock < 0 {
            return Err(StoreError::StockConflict {
                variant_id,
                requested: delta.abs(),
                available: variant.stock,
            });
        }

        let variant = inner
            .variants
            .get_mut(&variant_id)
            .expect("checked above");
        variant.stock = new_stock;
        let updated = variant.clone();
        append_inventory(&mut inner, variant_id, delta, kind, order_id, actor, note);
        Ok(updated)
    }

    async fn ledger_entries(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<InventoryTransactionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .inventory_log
            .iter()
            .filter(|t| t.variant_id == variant_id)
            .cloned()
            .collect())
    }

    async fn ledger_sum(&self, variant_id: VariantId) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .inventory_log
            .iter()
            .filter(|t| t.variant_id == variant_id)
            .map(|t| t.quantity)
            .sum())
    }

    async fn record_confirmation(
        &self,
        event_id: &str,
        order_id: OrderId,
        payment_ref: &str,
    ) -> Result<ConfirmationOutcome> {
        let mut inner = self.inner.write().await;

        if inner.confirmations.contains_key(event_id) {
            let order = inner
                .orders
                .get(&order_id)
                .ok_or(StoreError::OrderNotFound(order_id))?;
            return Ok(ConfirmationOutcome::Duplicate(order.clone()));
        }

        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        match &order.payment_ref {
            Some(existing) if existing == payment_ref => {
                // Same confirmation under a new event id; still a replay.
                let order = order.clone();
                inner.confirmations.insert(event_id.to_string(), order_id);
                Ok(ConfirmationOutcome::Duplicate(order))
            }
            Some(_) => Err(StoreError::AlreadyConfirmed { order_id }),
            None => {
                order.payment_ref = Some(payment_ref.to_string());
                if order.status == OrderStatus::Pending {
                    order.status = OrderStatus::Processing;
                }
                let order = order.clone();
                inner.confirmations.insert(event_id.to_string(), order_id);
                Ok(ConfirmationOutcome::Applied(order))
            }
        }
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.inner.read().await.orders.get(&order_id).cloned())
    }

    async fn list_orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<OrderRecord>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner
            .orders
            .values()
            .filter(|o| o.placed_by == Actor::Registered(customer_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn advance_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderRecord> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        order.status = status;
        let now = Utc::now();
        match status {
            OrderStatus::Shipped if order.shipped_at.is_none() => order.shipped_at = Some(now),
            OrderStatus::Delivered if order.delivered_at.is_none() => {
                order.delivered_at = Some(now)
            }
            _ => {}
        }
        Ok(order.clone())
    }

    async fn get_reward(&self, customer_id: CustomerId) -> Result<Option<RewardRecord>> {
        Ok(self.inner.read().await.rewards.get(&customer_id).cloned())
    }

    async fn point_history(&self, customer_id: CustomerId) -> Result<Vec<PointTransactionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .point_log
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn get_donation(&self, order_id: OrderId) -> Result<Option<DonationRecord>> {
        Ok(self.inner.read().await.donations.get(&order_id).cloned())
    }
}
