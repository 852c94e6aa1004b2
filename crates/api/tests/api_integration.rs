//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId, VariantId};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{CommerceStore, InMemoryStore, ProductRecord, VariantRecord};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> (axum::Router, Arc<InMemoryStore>, VariantId) {
    let store = Arc::new(InMemoryStore::new());

    let product_id = ProductId::new();
    store
        .insert_product(ProductRecord {
            id: product_id,
            name: "Reef Tee".to_string(),
        })
        .await
        .unwrap();

    let variant_id = VariantId::new();
    store
        .insert_variant(VariantRecord {
            id: variant_id,
            product_id,
            sku: "REEF-TEE-M".to_string(),
            name: "Reef Tee / M".to_string(),
            price: Money::from_cents(2000),
            stock: 5,
        })
        .await
        .unwrap();

    let state = api::create_default_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());
    (app, store, variant_id)
}

fn checkout_body(variant_id: VariantId, quantity: u32, key: &str) -> serde_json::Value {
    serde_json::json!({
        "customer_email": "shopper@example.com",
        "lines": [{
            "variant_id": variant_id.to_string(),
            "quantity": quantity
        }],
        "shipping_address": {
            "name": "A Shopper",
            "line1": "1 Beach Rd",
            "line2": null,
            "city": "South Padre Island",
            "state": "TX",
            "postal_code": "78597",
            "country": "US"
        },
        "idempotency_key": key
    })
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup().await;

    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_checkout_creates_order() {
    let (app, store, variant_id) = setup().await;

    let (status, json) = post_json(&app, "/checkout", &checkout_body(variant_id, 2, "k1")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["replayed"], false);
    assert_eq!(json["order"]["status"], "PENDING");
    assert_eq!(json["order"]["total_cents"], 4000);

    let variant = store.get_variant(variant_id).await.unwrap().unwrap();
    assert_eq!(variant.stock, 3);
}

#[tokio::test]
async fn test_checkout_replay_returns_200() {
    let (app, _, variant_id) = setup().await;

    let (first_status, first) =
        post_json(&app, "/checkout", &checkout_body(variant_id, 2, "k1")).await;
    assert_eq!(first_status, StatusCode::CREATED);

    let (replay_status, replay) =
        post_json(&app, "/checkout", &checkout_body(variant_id, 2, "k1")).await;
    assert_eq!(replay_status, StatusCode::OK);
    assert_eq!(replay["replayed"], true);
    assert_eq!(replay["order"]["id"], first["order"]["id"]);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let (app, _, variant_id) = setup().await;

    let (status, json) = post_json(&app, "/checkout", &checkout_body(variant_id, 9, "k1")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["variant_id"], variant_id.to_string());
    assert_eq!(json["requested"], 9);
    assert_eq!(json["available"], 5);
}

#[tokio::test]
async fn test_empty_cart_is_bad_request() {
    let (app, _, _) = setup().await;

    let body = serde_json::json!({
        "customer_email": "shopper@example.com",
        "lines": [],
        "shipping_address": {
            "name": "A Shopper",
            "line1": "1 Beach Rd",
            "city": "South Padre Island",
            "state": "TX",
            "postal_code": "78597",
            "country": "US"
        },
        "idempotency_key": "k1"
    });

    let (status, json) = post_json(&app, "/checkout", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_registered_checkout_accrues_rewards() {
    let (app, _, variant_id) = setup().await;
    let customer_id = uuid::Uuid::new_v4();

    let mut body = checkout_body(variant_id, 1, "k1");
    body["customer_id"] = serde_json::json!(customer_id.to_string());

    let (status, _) = post_json(&app, "/checkout", &body).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, rewards) = get_json(&app, &format!("/customers/{customer_id}/rewards")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rewards["points"], 4);
    assert_eq!(rewards["total_orders"], 1);
    assert_eq!(rewards["history"][0]["kind"], "PURCHASE");

    let (status, orders) = get_json(&app, &format!("/customers/{customer_id}/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rewards_for_unknown_customer_are_zero() {
    let (app, _, _) = setup().await;

    let (status, rewards) =
        get_json(&app, &format!("/customers/{}/rewards", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rewards["points"], 0);
    assert_eq!(rewards["total_orders"], 0);
}

#[tokio::test]
async fn test_payment_webhook_and_replay() {
    let (app, _, variant_id) = setup().await;

    let (_, created) = post_json(&app, "/checkout", &checkout_body(variant_id, 1, "k1")).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let webhook = serde_json::json!({
        "event_id": "evt-1",
        "order_id": order_id,
        "payment_ref": "POS-0001"
    });

    let (status, json) = post_json(&app, "/webhooks/payment", &webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["duplicate"], false);
    assert_eq!(json["order"]["status"], "PROCESSING");
    assert_eq!(json["order"]["payment_ref"], "POS-0001");

    // At-least-once delivery: the replay is also a 200.
    let (status, json) = post_json(&app, "/webhooks/payment", &webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["duplicate"], true);
    assert_eq!(json["order"]["status"], "PROCESSING");
}

#[tokio::test]
async fn test_conflicting_confirmation_is_conflict() {
    let (app, _, variant_id) = setup().await;

    let (_, created) = post_json(&app, "/checkout", &checkout_body(variant_id, 1, "k1")).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let first = serde_json::json!({
        "event_id": "evt-1",
        "order_id": order_id,
        "payment_ref": "POS-0001"
    });
    post_json(&app, "/webhooks/payment", &first).await;

    let conflicting = serde_json::json!({
        "event_id": "evt-2",
        "order_id": order_id,
        "payment_ref": "POS-0002"
    });
    let (status, _) = post_json(&app, "/webhooks/payment", &conflicting).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let (app, _, variant_id) = setup().await;

    let (_, created) = post_json(&app, "/checkout", &checkout_body(variant_id, 1, "k1")).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    // Pending -> Shipped skips Processing and is rejected.
    let (status, _) = post_json(
        &app,
        &format!("/orders/{order_id}/status"),
        &serde_json::json!({ "status": "SHIPPED" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = post_json(
        &app,
        &format!("/orders/{order_id}/status"),
        &serde_json::json!({ "status": "PROCESSING" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "PROCESSING");

    let (status, json) = post_json(
        &app,
        &format!("/orders/{order_id}/status"),
        &serde_json::json!({ "status": "SHIPPED" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "SHIPPED");
}

#[tokio::test]
async fn test_get_missing_order_is_404() {
    let (app, _, _) = setup().await;

    let (status, _) = get_json(&app, &format!("/orders/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/orders/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_variant_read_models() {
    let (app, _, variant_id) = setup().await;

    let (status, list) = get_json(&app, "/variants").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["sku"], "REEF-TEE-M");

    post_json(&app, "/checkout", &checkout_body(variant_id, 2, "k1")).await;

    let (status, detail) = get_json(&app, &format!("/variants/{variant_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["stock"], 3);
    assert_eq!(detail["ledger_sum"], 3);

    let (status, ledger) = get_json(&app, &format!("/variants/{variant_id}/ledger")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = ledger.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "RESTOCK");
    assert_eq!(entries[1]["kind"], "SALE");
    assert_eq!(entries[1]["quantity"], -2);
}

#[tokio::test]
async fn test_admin_inventory_adjust() {
    let (app, _, variant_id) = setup().await;

    let (status, json) = post_json(
        &app,
        "/admin/inventory/adjust",
        &serde_json::json!({
            "variant_id": variant_id.to_string(),
            "delta": 10,
            "kind": "RESTOCK",
            "note": "Weekly delivery"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stock"], 15);

    // Sale adjustments are reserved for checkout.
    let (status, _) = post_json(
        &app,
        "/admin/inventory/adjust",
        &serde_json::json!({
            "variant_id": variant_id.to_string(),
            "delta": -1,
            "kind": "SALE"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Draining below zero is rejected.
    let (status, _) = post_json(
        &app,
        "/admin/inventory/adjust",
        &serde_json::json!({
            "variant_id": variant_id.to_string(),
            "delta": -100,
            "kind": "ADJUSTMENT"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, variant_id) = setup().await;

    post_json(&app, "/checkout", &checkout_body(variant_id, 1, "k1")).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("checkout_attempts_total"));
}
