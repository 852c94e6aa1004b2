//! Payment confirmation webhook.
//!
//! External systems deliver confirmations at-least-once; replays get
//! the same 200 response as the first delivery.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use order_store::CommerceStore;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::orders::{order_response, parse_order_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PaymentConfirmation {
    /// Unique id of the delivery event, used for deduplication.
    pub event_id: String,
    pub order_id: String,
    pub payment_ref: String,
}

#[derive(Serialize)]
pub struct ConfirmationResponse {
    pub order: super::orders::OrderResponse,
    pub duplicate: bool,
}

/// POST /webhooks/payment — apply a payment confirmation to an order.
#[tracing::instrument(skip(state, req), fields(event_id = %req.event_id))]
pub async fn payment_confirmed<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PaymentConfirmation>,
) -> Result<Json<ConfirmationResponse>, ApiError> {
    let order_id = parse_order_id(&req.order_id)?;

    let outcome = state
        .confirmations
        .apply(&req.event_id, order_id, &req.payment_ref)
        .await?;

    Ok(Json(ConfirmationResponse {
        order: order_response(outcome.order()),
        duplicate: outcome.is_duplicate(),
    }))
}
