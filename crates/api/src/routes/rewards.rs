//! Customer rewards read model.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use order_store::CommerceStore;
use serde::Serialize;

use super::AppState;
use super::orders::parse_customer_id;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct RewardsResponse {
    pub customer_id: String,
    pub points: i64,
    pub total_spent_cents: i64,
    pub total_orders: i64,
    pub history: Vec<PointTransactionResponse>,
}

#[derive(Serialize)]
pub struct PointTransactionResponse {
    pub points: i64,
    pub kind: String,
    pub description: String,
    pub order_id: Option<String>,
    pub created_at: String,
}

/// GET /customers/{id}/rewards — balance plus point history.
///
/// A customer who has never ordered gets a zero balance, not a 404.
#[tracing::instrument(skip(state))]
pub async fn get<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<RewardsResponse>, ApiError> {
    let customer_id = parse_customer_id(&id)?;

    let reward = state.store.get_reward(customer_id).await?;
    let history = state.store.point_history(customer_id).await?;

    let (points, total_spent_cents, total_orders) = match reward {
        Some(r) => (r.points, r.total_spent.cents(), r.total_orders),
        None => (0, 0, 0),
    };

    Ok(Json(RewardsResponse {
        customer_id: customer_id.to_string(),
        points,
        total_spent_cents,
        total_orders,
        history: history
            .into_iter()
            .map(|t| PointTransactionResponse {
                points: t.points,
                kind: t.kind.as_str().to_string(),
                description: t.description,
                order_id: t.order_id.map(|id| id.to_string()),
                created_at: t.created_at.to_rfc3339(),
            })
            .collect(),
    }))
}
