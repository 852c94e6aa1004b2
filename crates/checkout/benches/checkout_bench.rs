use std::sync::Arc;

use checkout::{
    CartLine, CheckoutRequest, CheckoutService, InMemoryNotifier, InMemoryPaymentGateway,
};
use common::{Actor, CustomerId, IdempotencyKey, Money, ProductId, VariantId};
use criterion::{Criterion, criterion_group, criterion_main};
use order_store::{CommerceStore, InMemoryStore, ProductRecord, ShippingAddress, VariantRecord};

fn seed(rt: &tokio::runtime::Runtime, store: &InMemoryStore, stock: i64) -> VariantId {
    let product_id = ProductId::new();
    let variant_id = VariantId::new();
    rt.block_on(async {
        store
            .insert_product(ProductRecord {
                id: product_id,
                name: "Bench Tee".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_variant(VariantRecord {
                id: variant_id,
                product_id,
                sku: "BENCH-TEE".to_string(),
                name: "Bench Tee / M".to_string(),
                price: Money::from_cents(2000),
                stock,
            })
            .await
            .unwrap();
    });
    variant_id
}

fn request(variant_id: VariantId, key: String) -> CheckoutRequest {
    CheckoutRequest {
        customer: Actor::Registered(CustomerId::new()),
        customer_email: "bench@example.com".to_string(),
        lines: vec![CartLine {
            variant_id,
            quantity: 1,
            unit_price_claimed: None,
        }],
        shipping_address: ShippingAddress {
            name: "Bench Shopper".to_string(),
            line1: "1 Bench Rd".to_string(),
            line2: None,
            city: "South Padre Island".to_string(),
            state: "TX".to_string(),
            postal_code: "78597".to_string(),
            country: "US".to_string(),
        },
        shipping: Money::zero(),
        tax: Money::zero(),
        donation_percent: None,
        idempotency_key: IdempotencyKey::new(key),
    }
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let variant_id = seed(&rt, &store, i64::MAX / 2);
    let service = CheckoutService::new(
        store,
        Arc::new(InMemoryPaymentGateway::new()),
        Arc::new(InMemoryNotifier::new()),
    );

    let mut n = 0u64;
    c.bench_function("checkout/single_line", |b| {
        b.iter(|| {
            n += 1;
            rt.block_on(async {
                service
                    .checkout(request(variant_id, format!("bench-{n}")))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let variant_id = seed(&rt, &store, 1000);
    let service = CheckoutService::new(
        store,
        Arc::new(InMemoryPaymentGateway::new()),
        Arc::new(InMemoryNotifier::new()),
    );

    rt.block_on(async {
        service
            .checkout(request(variant_id, "replay-key".to_string()))
            .await
            .unwrap();
    });

    c.bench_function("checkout/idempotent_replay", |b| {
        b.iter(|| {
            rt.block_on(async {
                let outcome = service
                    .checkout(request(variant_id, "replay-key".to_string()))
                    .await
                    .unwrap();
                assert!(outcome.is_replay());
            });
        });
    });
}

criterion_group!(benches, bench_checkout, bench_replay);
criterion_main!(benches);
