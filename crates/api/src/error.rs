//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use order_store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout/domain logic error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": msg }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, serde_json::Value) {
    match &err {
        CheckoutError::Validation(_) => {
            (StatusCode::BAD_REQUEST, serde_json::json!({ "error": err.to_string() }))
        }
        CheckoutError::InsufficientStock {
            variant_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            serde_json::json!({
                "error": err.to_string(),
                "variant_id": variant_id.to_string(),
                "requested": requested,
                "available": available,
            }),
        ),
        CheckoutError::DuplicateInFlight => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": err.to_string(), "retry": true }),
        ),
        CheckoutError::Gateway(_) => (
            StatusCode::BAD_GATEWAY,
            serde_json::json!({ "error": err.to_string() }),
        ),
        CheckoutError::Store(store_err) => store_error_to_response(store_err, &err),
    }
}

fn store_error_to_response(
    store_err: &StoreError,
    err: &CheckoutError,
) -> (StatusCode, serde_json::Value) {
    let status = match store_err {
        StoreError::VariantNotFound(_) | StoreError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::KeyReuse(_) => StatusCode::BAD_REQUEST,
        StoreError::InvalidTransition { .. } | StoreError::AlreadyConfirmed { .. } => {
            StatusCode::CONFLICT
        }
        StoreError::StockConflict { .. } => StatusCode::CONFLICT,
        StoreError::Database(_) | StoreError::Migration(_) | StoreError::Serialization(_) => {
            tracing::error!(error = %store_err, "storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, serde_json::json!({ "error": err.to_string() }))
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(CheckoutError::from(err))
    }
}
