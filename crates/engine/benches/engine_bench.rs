use std::sync::Arc;

use common::{Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::Product;
use engine::{Engine, EngineConfig};
use payments::{InMemoryPaymentProvider, PAYMENT_SUCCEEDED};
use store::InMemoryStore;

const SECRET: &str = "whsec_bench";

fn engine(rt: &tokio::runtime::Runtime) -> (Engine<InMemoryStore, InMemoryPaymentProvider>, Arc<InMemoryPaymentProvider>) {
    let store = rt.block_on(InMemoryStore::with_products([Product::new(
        "SKU-BENCH",
        "Benchmark Widget",
        Money::from_cents(1000),
        u32::MAX,
    )]));
    let provider = Arc::new(InMemoryPaymentProvider::new());
    let config = EngineConfig {
        webhook_secret: SECRET.to_string(),
        ..EngineConfig::default()
    };
    (Engine::new(store, provider.clone(), config), provider)
}

fn bench_add_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, _) = engine(&rt);
    let user = UserId::new();
    let product = ProductId::new("SKU-BENCH");

    c.bench_function("engine/add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.carts.add_item(user, &product, 1).await.unwrap();
            });
        });
    });
}

fn bench_checkout_and_reconcile(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, provider) = engine(&rt);
    let product = ProductId::new("SKU-BENCH");

    c.bench_function("engine/checkout_and_reconcile", |b| {
        b.iter(|| {
            rt.block_on(async {
                let user = UserId::new();
                engine.carts.add_item(user, &product, 2).await.unwrap();
                let receipt = engine.checkout.checkout(user).await.unwrap();

                let (body, header) = provider
                    .signed_event("evt_bench", PAYMENT_SUCCEEDED, &receipt.payment_ref, SECRET)
                    .unwrap();
                engine
                    .reconciler
                    .handle_provider_event(&body, Some(&header))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_add_item, bench_checkout_and_reconcile);
criterion_main!(benches);
