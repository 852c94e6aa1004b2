use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Actor, CustomerId, IdempotencyKey, Money, OrderId, ProductId, VariantId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::plan::CheckoutPlan;
use crate::records::{
    AttemptGate, AttemptState, ConfirmationOutcome, DonationRecord, DonationStatus,
    InventoryTransactionKind, InventoryTransactionRecord, OrderItemRecord, OrderRecord,
    OrderStatus, PointTransactionKind, PointTransactionRecord, ProductRecord, RewardRecord,
    ShippingAddress, VariantRecord,
};
use crate::store::CommerceStore;
use crate::{Result, StoreError};

/// PostgreSQL-backed commerce store.
///
/// Each trait method runs in its own transaction. Contended variant rows
/// are taken with `SELECT ... FOR UPDATE` for the duration of the
/// check-and-decrement only, and always in variant-id order so
/// concurrent multi-line checkouts cannot deadlock.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn corrupt(msg: impl Into<String>) -> StoreError {
    StoreError::Serialization(serde_json::Error::io(std::io::Error::other(msg.into())))
}

fn actor_columns(actor: Actor) -> (&'static str, Option<Uuid>) {
    match actor {
        Actor::Guest => ("guest", None),
        Actor::Registered(id) => ("registered", Some(id.as_uuid())),
        Actor::System => ("system", None),
    }
}

fn actor_from(kind: &str, customer_id: Option<Uuid>) -> Result<Actor> {
    match (kind, customer_id) {
        ("guest", _) => Ok(Actor::Guest),
        ("system", _) => Ok(Actor::System),
        ("registered", Some(id)) => Ok(Actor::Registered(CustomerId::from_uuid(id))),
        _ => Err(corrupt(format!("invalid actor row: {kind}"))),
    }
}

impl PostgresStore {
    /// Creates a new PostgreSQL commerce store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_variant(row: PgRow) -> Result<VariantRecord> {
        Ok(VariantRecord {
            id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
        })
    }

    fn row_to_order_header(row: PgRow) -> Result<OrderRecord> {
        let status_text: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_text)
            .ok_or_else(|| corrupt(format!("invalid order status: {status_text}")))?;
        let placed_by = match row.try_get::<Option<Uuid>, _>("customer_id")? {
            Some(id) => Actor::Registered(CustomerId::from_uuid(id)),
            None => Actor::Guest,
        };

        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            placed_by,
            customer_email: row.try_get("customer_email")?,
            status,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            shipping: Money::from_cents(row.try_get("shipping_cents")?),
            tax: Money::from_cents(row.try_get("tax_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            shipping_address: ShippingAddress {
                name: row.try_get("ship_name")?,
                line1: row.try_get("ship_line1")?,
                line2: row.try_get("ship_line2")?,
                city: row.try_get("ship_city")?,
                state: row.try_get("ship_state")?,
                postal_code: row.try_get("ship_postal_code")?,
                country: row.try_get("ship_country")?,
            },
            payment_ref: row.try_get("payment_ref")?,
            created_at: row.try_get("created_at")?,
            shipped_at: row.try_get("shipped_at")?,
            delivered_at: row.try_get("delivered_at")?,
            items: Vec::new(),
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    fn row_to_inventory(row: PgRow) -> Result<InventoryTransactionRecord> {
        let kind_text: String = row.try_get("kind")?;
        let kind = InventoryTransactionKind::parse(&kind_text)
            .ok_or_else(|| corrupt(format!("invalid inventory kind: {kind_text}")))?;
        let actor_kind: String = row.try_get("actor_kind")?;
        let actor = actor_from(&actor_kind, row.try_get("actor_customer_id")?)?;

        Ok(InventoryTransactionRecord {
            id: row.try_get("id")?,
            variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
            quantity: row.try_get("quantity")?,
            kind,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            actor,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_point(row: PgRow) -> Result<PointTransactionRecord> {
        let kind_text: String = row.try_get("kind")?;
        let kind = PointTransactionKind::parse(&kind_text)
            .ok_or_else(|| corrupt(format!("invalid point kind: {kind_text}")))?;

        Ok(PointTransactionRecord {
            id: row.try_get("id")?,
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            points: row.try_get("points")?,
            kind,
            description: row.try_get("description")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            created_at: row.try_get("created_at")?,
        })
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, variant_id, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let mut order = Self::row_to_order_header(row)?;
                order.items = self.load_items(order_id).await?;
                Ok(Some(order))
            }
        }
    }
}

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn insert_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name) VALUES ($1, $2)")
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_variant(&self, variant: VariantRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO variants (id, product_id, sku, name, price_cents, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(variant.product_id.as_uuid())
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.price.cents())
        .bind(variant.stock)
        .execute(&mut *tx)
        .await?;

        if variant.stock > 0 {
            sqlx::query(
                r#"
                INSERT INTO inventory_transactions
                    (id, variant_id, quantity, kind, order_id, actor_kind, actor_customer_id, note, created_at)
                VALUES ($1, $2, $3, $4, NULL, $5, NULL, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(variant.id.as_uuid())
            .bind(variant.stock)
            .bind(InventoryTransactionKind::Restock.as_str())
            .bind("system")
            .bind("Initial stock")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_variant(&self, variant_id: VariantId) -> Result<Option<VariantRecord>> {
        let row = sqlx::query("SELECT * FROM variants WHERE id = $1")
            .bind(variant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_variant).transpose()
    }

    async fn list_variants(&self) -> Result<Vec<VariantRecord>> {
        let rows = sqlx::query("SELECT * FROM variants ORDER BY sku")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_variant).collect()
    }

    #[tracing::instrument(skip(self, fingerprint))]
    async fn begin_attempt(
        &self,
        key: &IdempotencyKey,
        fingerprint: &str,
        lease: Duration,
    ) -> Result<AttemptGate> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query(
            "SELECT fingerprint, state, order_id, locked_at FROM checkout_attempts WHERE key = $1 FOR UPDATE",
        )
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let gate = match row {
            None => {
                // FOR UPDATE on a missing row locks nothing, so two first
                // submissions can both reach this insert. The conflict
                // clause makes the loser's insert a no-op; it must not
                // claim the key.
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO checkout_attempts (key, fingerprint, state, order_id, locked_at)
                    VALUES ($1, $2, $3, NULL, $4)
                    ON CONFLICT (key) DO NOTHING
                    "#,
                )
                .bind(key.as_str())
                .bind(fingerprint)
                .bind(AttemptState::InFlight.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if inserted == 0 {
                    // Lost the race to a concurrent submission that
                    // committed the key first. That attempt now holds
                    // the lease; a later retry sees its outcome.
                    AttemptGate::InFlight
                } else {
                    AttemptGate::Fresh
                }
            }
            Some(row) => {
                let stored_fingerprint: String = row.try_get("fingerprint")?;
                if stored_fingerprint != fingerprint {
                    return Err(StoreError::KeyReuse(key.clone()));
                }

                let state_text: String = row.try_get("state")?;
                let state = AttemptState::parse(&state_text)
                    .ok_or_else(|| corrupt(format!("invalid attempt state: {state_text}")))?;

                match state {
                    AttemptState::Completed => {
                        let order_id: Option<Uuid> = row.try_get("order_id")?;
                        let order_id = order_id
                            .ok_or_else(|| corrupt("completed attempt without order id"))?;
                        AttemptGate::Completed(OrderId::from_uuid(order_id))
                    }
                    AttemptState::Failed => {
                        sqlx::query(
                            "UPDATE checkout_attempts SET state = $2, locked_at = $3 WHERE key = $1",
                        )
                        .bind(key.as_str())
                        .bind(AttemptState::InFlight.as_str())
                        .bind(now)
                        .execute(&mut *tx)
                        .await?;
                        AttemptGate::Fresh
                    }
                    AttemptState::InFlight => {
                        let locked_at: DateTime<Utc> = row.try_get("locked_at")?;
                        let age = (now - locked_at).to_std().unwrap_or(Duration::ZERO);
                        if age > lease {
                            // Lease expired: the previous holder crashed.
                            sqlx::query(
                                "UPDATE checkout_attempts SET locked_at = $2 WHERE key = $1",
                            )
                            .bind(key.as_str())
                            .bind(now)
                            .execute(&mut *tx)
                            .await?;
                            AttemptGate::Fresh
                        } else {
                            AttemptGate::InFlight
                        }
                    }
                }
            }
        };

        tx.commit().await?;
        Ok(gate)
    }

    async fn fail_attempt(&self, key: &IdempotencyKey) -> Result<()> {
        sqlx::query("UPDATE checkout_attempts SET state = $2 WHERE key = $1")
            .bind(key.as_str())
            .bind(AttemptState::Failed.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, plan), fields(order_id = %plan.order_id))]
    async fn commit_checkout(&self, plan: CheckoutPlan) -> Result<OrderRecord> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        // Lock variants in id order so concurrent multi-line checkouts
        // acquire row locks in the same sequence.
        let mut lines = plan.lines.clone();
        lines.sort_by_key(|line| line.variant_id.as_uuid());

        for line in &lines {
            let row = sqlx::query("SELECT stock FROM variants WHERE id = $1 FOR UPDATE")
                .bind(line.variant_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::VariantNotFound(line.variant_id))?;

            let stock: i64 = row.try_get("stock")?;
            if stock < line.quantity as i64 {
                return Err(StoreError::StockConflict {
                    variant_id: line.variant_id,
                    requested: line.quantity as i64,
                    available: stock,
                });
            }

            sqlx::query("UPDATE variants SET stock = stock - $2 WHERE id = $1")
                .bind(line.variant_id.as_uuid())
                .bind(line.quantity as i64)
                .execute(&mut *tx)
                .await?;
        }

        let customer_id = plan.placed_by.customer_id().map(|id| id.as_uuid());
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, customer_id, customer_email, status,
                 subtotal_cents, shipping_cents, tax_cents, total_cents,
                 ship_name, ship_line1, ship_line2, ship_city, ship_state,
                 ship_postal_code, ship_country, payment_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NULL, $16)
            "#,
        )
        .bind(plan.order_id.as_uuid())
        .bind(customer_id)
        .bind(&plan.customer_email)
        .bind(OrderStatus::Pending.as_str())
        .bind(plan.subtotal.cents())
        .bind(plan.shipping.cents())
        .bind(plan.tax.cents())
        .bind(plan.total.cents())
        .bind(&plan.shipping_address.name)
        .bind(&plan.shipping_address.line1)
        .bind(&plan.shipping_address.line2)
        .bind(&plan.shipping_address.city)
        .bind(&plan.shipping_address.state)
        .bind(&plan.shipping_address.postal_code)
        .bind(&plan.shipping_address.country)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let note = format!("Order #{}", plan.order_id.short());
        let (actor_kind, actor_customer_id) = actor_columns(plan.placed_by);
        let mut items = Vec::with_capacity(plan.lines.len());

        for line in &plan.lines {
            let item_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, variant_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item_id)
            .bind(plan.order_id.as_uuid())
            .bind(line.variant_id.as_uuid())
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO inventory_transactions
                    (id, variant_id, quantity, kind, order_id, actor_kind, actor_customer_id, note, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(line.variant_id.as_uuid())
            .bind(-(line.quantity as i64))
            .bind(InventoryTransactionKind::Sale.as_str())
            .bind(plan.order_id.as_uuid())
            .bind(actor_kind)
            .bind(actor_customer_id)
            .bind(&note)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            items.push(OrderItemRecord {
                id: item_id,
                order_id: plan.order_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO conservation_donations
                (id, order_id, amount_cents, percent, region, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(plan.order_id.as_uuid())
        .bind(plan.donation.amount.cents())
        .bind(plan.donation.percent as i32)
        .bind(&plan.donation.region)
        .bind(DonationStatus::Pledged.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(reward) = &plan.reward {
            sqlx::query(
                r#"
                INSERT INTO customer_rewards (customer_id, points, total_spent_cents, total_orders, updated_at)
                VALUES ($1, $2, $3, 1, $4)
                ON CONFLICT (customer_id) DO UPDATE SET
                    points = customer_rewards.points + EXCLUDED.points,
                    total_spent_cents = customer_rewards.total_spent_cents + EXCLUDED.total_spent_cents,
                    total_orders = customer_rewards.total_orders + 1,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(reward.customer_id.as_uuid())
            .bind(reward.points)
            .bind(plan.total.cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO point_transactions
                    (id, customer_id, points, kind, description, order_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(reward.customer_id.as_uuid())
            .bind(reward.points)
            .bind(PointTransactionKind::Purchase.as_str())
            .bind(&reward.description)
            .bind(plan.order_id.as_uuid())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // The key completes inside the same commit as the order writes.
        // A key another commit already completed must not be overwritten;
        // affecting zero rows here aborts the whole transaction.
        let completed = sqlx::query(
            r#"
            INSERT INTO checkout_attempts (key, fingerprint, state, order_id, locked_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (key) DO UPDATE SET
                state = EXCLUDED.state,
                order_id = EXCLUDED.order_id,
                locked_at = EXCLUDED.locked_at
            WHERE checkout_attempts.state <> 'COMPLETED'
            "#,
        )
        .bind(plan.idempotency_key.as_str())
        .bind(&plan.fingerprint)
        .bind(AttemptState::Completed.as_str())
        .bind(plan.order_id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if completed == 0 {
            return Err(StoreError::KeyReuse(plan.idempotency_key.clone()));
        }

        tx.commit().await?;

        Ok(OrderRecord {
            id: plan.order_id,
            placed_by: plan.placed_by,
            customer_email: plan.customer_email,
            status: OrderStatus::Pending,
            subtotal: plan.subtotal,
            shipping: plan.shipping,
            tax: plan.tax,
            total: plan.total,
            shipping_address: plan.shipping_address,
            payment_ref: None,
            created_at: now,
            shipped_at: None,
            delivered_at: None,
            items,
        })
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
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM variants WHERE id = $1 FOR UPDATE")
            .bind(variant_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::VariantNotFound(variant_id))?;
        let mut variant = Self::row_to_variant(row)?;

        if variant.stock + delta < 0 {
            return Err(StoreError::StockConflict {
                variant_id,
                requested: delta.abs(),
                available: variant.stock,
            });
        }

        sqlx::query("UPDATE variants SET stock = stock + $2 WHERE id = $1")
            .bind(variant_id.as_uuid())
            .bind(delta)
            .execute(&mut *tx)
            .await?;

        let (actor_kind, actor_customer_id) = actor_columns(actor);
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions
                (id, variant_id, quantity, kind, order_id, actor_kind, actor_customer_id, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(variant_id.as_uuid())
        .bind(delta)
        .bind(kind.as_str())
        .bind(order_id.map(|id| id.as_uuid()))
        .bind(actor_kind)
        .bind(actor_customer_id)
        .bind(&note)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        variant.stock += delta;
        Ok(variant)
    }

    async fn ledger_entries(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<InventoryTransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM inventory_transactions
            WHERE variant_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(variant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_inventory).collect()
    }

    async fn ledger_sum(&self, variant_id: VariantId) -> Result<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity) FROM inventory_transactions WHERE variant_id = $1",
        )
        .bind(variant_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(sum.unwrap_or(0))
    }

    #[tracing::instrument(skip(self))]
    async fn record_confirmation(
        &self,
        event_id: &str,
        order_id: OrderId,
        payment_ref: &str,
    ) -> Result<ConfirmationOutcome> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT payment_ref, status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        // Dedup insert: a second delivery of the same event id hits the
        // primary key and changes nothing.
        let inserted = sqlx::query(
            r#"
            INSERT INTO payment_confirmations (event_id, order_id, payment_ref, received_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(order_id.as_uuid())
        .bind(payment_ref)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            let order = self
                .load_order(order_id)
                .await?
                .ok_or(StoreError::OrderNotFound(order_id))?;
            return Ok(ConfirmationOutcome::Duplicate(order));
        }

        let existing: Option<String> = row.try_get("payment_ref")?;
        let duplicate = match existing.as_deref() {
            Some(prior) if prior == payment_ref => true,
            Some(_) => return Err(StoreError::AlreadyConfirmed { order_id }),
            None => false,
        };

        if !duplicate {
            sqlx::query(
                r#"
                UPDATE orders
                SET payment_ref = $2,
                    status = CASE WHEN status = 'PENDING' THEN 'PROCESSING' ELSE status END
                WHERE id = $1
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(payment_ref)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let order = self
            .load_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if duplicate {
            Ok(ConfirmationOutcome::Duplicate(order))
        } else {
            Ok(ConfirmationOutcome::Applied(order))
        }
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        self.load_order(order_id).await
    }

    async fn list_orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<OrderRecord>> {
        let rows =
            sqlx::query("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
                .bind(customer_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let mut order = Self::row_to_order_header(row)?;
            order.items = self.load_items(order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    async fn advance_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderRecord> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let current_text: String = row.try_get("status")?;
        let current = OrderStatus::parse(&current_text)
            .ok_or_else(|| corrupt(format!("invalid order status: {current_text}")))?;

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                shipped_at = CASE WHEN $2 = 'SHIPPED' AND shipped_at IS NULL THEN $3 ELSE shipped_at END,
                delivered_at = CASE WHEN $2 = 'DELIVERED' AND delivered_at IS NULL THEN $3 ELSE delivered_at END
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.load_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn get_reward(&self, customer_id: CustomerId) -> Result<Option<RewardRecord>> {
        let row = sqlx::query("SELECT * FROM customer_rewards WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(RewardRecord {
                customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
                points: row.try_get("points")?,
                total_spent: Money::from_cents(row.try_get("total_spent_cents")?),
                total_orders: row.try_get("total_orders")?,
                updated_at: row.try_get("updated_at")?,
            })),
        }
    }

    async fn point_history(&self, customer_id: CustomerId) -> Result<Vec<PointTransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM point_transactions
            WHERE customer_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_point).collect()
    }

    async fn get_donation(&self, order_id: OrderId) -> Result<Option<DonationRecord>> {
        let row = sqlx::query("SELECT * FROM conservation_donations WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let status_text: String = row.try_get("status")?;
                let status = DonationStatus::parse(&status_text)
                    .ok_or_else(|| corrupt(format!("invalid donation status: {status_text}")))?;
                Ok(Some(DonationRecord {
                    id: row.try_get("id")?,
                    order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                    amount: Money::from_cents(row.try_get("amount_cents")?),
                    percent: row.try_get::<i32, _>("percent")? as u32,
                    region: row.try_get("region")?,
                    status,
                    created_at: row.try_get("created_at")?,
                }))
            }
        }
    }
}
