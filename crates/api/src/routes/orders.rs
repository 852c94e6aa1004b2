//! Checkout submission and order read/lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CartLine, CheckoutOutcome, CheckoutRequest};
use common::{Actor, CustomerId, IdempotencyKey, Money, OrderId, VariantId};
use order_store::{CommerceStore, OrderRecord, OrderStatus, ShippingAddress};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutSubmission {
    /// Absent for guest checkout.
    pub customer_id: Option<uuid::Uuid>,
    pub customer_email: String,
    pub lines: Vec<CartLineRequest>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub shipping_cents: i64,
    #[serde(default)]
    pub tax_cents: i64,
    pub donation_percent: Option<u32>,
    pub idempotency_key: String,
}

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub variant_id: uuid::Uuid,
    pub quantity: u32,
    pub unit_price_cents: Option<i64>,
}

#[derive(Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub status: String,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_ref: Option<String>,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub variant_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order: OrderResponse,
    pub replayed: bool,
    pub price_warnings: Vec<String>,
}

pub(crate) fn order_response(order: &OrderRecord) -> OrderResponse {
    OrderResponse {
        id: order.id.to_string(),
        customer_id: order.placed_by.customer_id().map(|c| c.to_string()),
        customer_email: order.customer_email.clone(),
        status: order.status.as_str().to_string(),
        subtotal_cents: order.subtotal.cents(),
        shipping_cents: order.shipping.cents(),
        tax_cents: order.tax.cents(),
        total_cents: order.total.cents(),
        payment_ref: order.payment_ref.clone(),
        created_at: order.created_at.to_rfc3339(),
        items: order
            .items
            .iter()
            .map(|item| OrderItemResponse {
                variant_id: item.variant_id.to_string(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price.cents(),
            })
            .collect(),
    }
}

// -- Handlers --

/// POST /checkout — submit a cart as one atomic order.
///
/// Returns 201 for a new order and 200 for an idempotent replay.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CheckoutSubmission>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let customer = match req.customer_id {
        Some(id) => Actor::Registered(CustomerId::from_uuid(id)),
        None => Actor::Guest,
    };

    let request = CheckoutRequest {
        customer,
        customer_email: req.customer_email,
        lines: req
            .lines
            .into_iter()
            .map(|l| CartLine {
                variant_id: VariantId::from_uuid(l.variant_id),
                quantity: l.quantity,
                unit_price_claimed: l.unit_price_cents.map(Money::from_cents),
            })
            .collect(),
        shipping_address: req.shipping_address,
        shipping: Money::from_cents(req.shipping_cents),
        tax: Money::from_cents(req.tax_cents),
        donation_percent: req.donation_percent,
        idempotency_key: IdempotencyKey::new(req.idempotency_key),
    };

    let outcome = state.checkout.checkout(request).await?;

    let (status, replayed) = match &outcome {
        CheckoutOutcome::Created { .. } => (StatusCode::CREATED, false),
        CheckoutOutcome::Replayed { .. } => (StatusCode::OK, true),
    };

    let response = CheckoutResponse {
        order: order_response(outcome.order()),
        replayed,
        price_warnings: outcome.price_warnings().to_vec(),
    };
    Ok((status, Json(response)))
}

/// GET /orders/{id} — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order_response(&order)))
}

/// GET /customers/{id}/orders — list a customer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_customer<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let customer_id = parse_customer_id(&id)?;
    let orders = state.store.list_orders_for_customer(customer_id).await?;
    Ok(Json(orders.iter().map(order_response).collect()))
}

/// POST /orders/{id}/status — advance an order through its lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn advance_status<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AdvanceStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status = OrderStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {}", req.status)))?;

    let order = state.store.advance_status(order_id, status).await?;
    Ok(Json(order_response(&order)))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

pub(crate) fn parse_customer_id(id: &str) -> Result<CustomerId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(CustomerId::from_uuid(uuid))
}
