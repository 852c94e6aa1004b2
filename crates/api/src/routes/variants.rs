//! Catalog/stock read models and the admin inventory adjustment path.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Actor, VariantId};
use order_store::{CommerceStore, InventoryTransactionKind, VariantRecord};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct VariantResponse {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: i64,
}

#[derive(Serialize)]
pub struct VariantDetailResponse {
    #[serde(flatten)]
    pub variant: VariantResponse,
    /// Sum of the ledger; equals `stock` unless the store has drifted.
    pub ledger_sum: i64,
}

#[derive(Serialize)]
pub struct LedgerEntryResponse {
    pub quantity: i64,
    pub kind: String,
    pub order_id: Option<String>,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Deserialize)]
pub struct AdjustStockRequest {
    pub variant_id: uuid::Uuid,
    pub delta: i64,
    /// "RESTOCK" or "ADJUSTMENT".
    pub kind: String,
    pub note: Option<String>,
}

fn variant_response(v: &VariantRecord) -> VariantResponse {
    VariantResponse {
        id: v.id.to_string(),
        product_id: v.product_id.to_string(),
        sku: v.sku.clone(),
        name: v.name.clone(),
        price_cents: v.price.cents(),
        stock: v.stock,
    }
}

/// GET /variants — list the catalog with live stock.
#[tracing::instrument(skip(state))]
pub async fn list<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<VariantResponse>>, ApiError> {
    let variants = state.store.list_variants().await?;
    Ok(Json(variants.iter().map(variant_response).collect()))
}

/// GET /variants/{id} — one variant with its ledger sum.
#[tracing::instrument(skip(state))]
pub async fn get<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<VariantDetailResponse>, ApiError> {
    let variant_id = parse_variant_id(&id)?;
    let variant = state
        .store
        .get_variant(variant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Variant {id} not found")))?;
    let ledger_sum = state.store.ledger_sum(variant_id).await?;

    Ok(Json(VariantDetailResponse {
        variant: variant_response(&variant),
        ledger_sum,
    }))
}

/// GET /variants/{id}/ledger — the full movement history, oldest first.
#[tracing::instrument(skip(state))]
pub async fn ledger<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntryResponse>>, ApiError> {
    let variant_id = parse_variant_id(&id)?;
    let entries = state.store.ledger_entries(variant_id).await?;

    Ok(Json(
        entries
            .into_iter()
            .map(|e| LedgerEntryResponse {
                quantity: e.quantity,
                kind: e.kind.as_str().to_string(),
                order_id: e.order_id.map(|id| id.to_string()),
                actor: e.actor.to_string(),
                note: e.note,
                created_at: e.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

/// POST /admin/inventory/adjust — apply a signed stock delta with its
/// ledger row.
#[tracing::instrument(skip(state, req))]
pub async fn adjust<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<VariantResponse>, ApiError> {
    let kind = match InventoryTransactionKind::parse(&req.kind) {
        Some(k @ (InventoryTransactionKind::Restock | InventoryTransactionKind::Adjustment)) => k,
        _ => {
            return Err(ApiError::BadRequest(format!(
                "Unsupported adjustment kind: {}",
                req.kind
            )));
        }
    };

    let variant = state
        .store
        .adjust_stock(
            VariantId::from_uuid(req.variant_id),
            req.delta,
            kind,
            None,
            Actor::System,
            req.note,
        )
        .await?;

    Ok(Json(variant_response(&variant)))
}

fn parse_variant_id(id: &str) -> Result<VariantId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(VariantId::from_uuid(uuid))
}
