use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use waxmarket_catalog::{
    AdjustStock, ListProduct, Product, ProductCommand, ProductId, ProductType, StockDirection,
};
use waxmarket_core::{AggregateId, AlbumId, ProviderId};
use waxmarket_events::{EventEnvelope, InMemoryEventBus};
use waxmarket_infra::command_dispatcher::CommandDispatcher;
use waxmarket_infra::event_store::InMemoryEventStore;

/// Naive CRUD baseline: direct key-value stock updates (no events, no history).
#[derive(Debug, Clone)]
struct NaiveCrudStore {
    inner: Arc<RwLock<HashMap<AggregateId, i64>>>,
}

impl NaiveCrudStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn create(&self, product_id: AggregateId, stock: i64) {
        self.inner.write().unwrap().insert(product_id, stock);
    }

    fn adjust(&self, product_id: AggregateId, delta: i64) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        let stock = map.get_mut(&product_id).ok_or(())?;
        let next = *stock + delta;
        if next < 0 {
            return Err(());
        }
        *stock = next;
        Ok(())
    }
}

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;

fn sourced_setup() -> (
    CommandDispatcher<Arc<InMemoryEventStore>, Bus>,
    ProviderId,
    ProductId,
) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);

    let provider_id = ProviderId::new();
    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    dispatcher
        .dispatch::<Product>(
            agg,
            "catalog.product",
            ProductCommand::ListProduct(ListProduct {
                provider_id,
                product_id,
                album_id: AlbumId::new(),
                price_cents: 1000,
                stock: 0,
                product_type: ProductType::Physical,
                featured: false,
                occurred_at: Utc::now(),
            }),
            |id| Product::empty(ProductId::new(id)),
        )
        .expect("listing failed");

    (dispatcher, provider_id, product_id)
}

fn bench_stock_adjustment(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_adjustment");
    group.throughput(Throughput::Elements(1));

    group.bench_function("naive_crud", |b| {
        let store = NaiveCrudStore::new();
        let product_id = AggregateId::new();
        store.create(product_id, 0);

        b.iter(|| {
            store.adjust(black_box(product_id), black_box(1)).unwrap();
        });
    });

    group.bench_function("event_sourced_dispatch", |b| {
        let (dispatcher, provider_id, product_id) = sourced_setup();

        b.iter(|| {
            dispatcher
                .dispatch::<Product>(
                    product_id.0,
                    "catalog.product",
                    ProductCommand::AdjustStock(AdjustStock {
                        provider_id,
                        product_id,
                        direction: StockDirection::Increment,
                        amount: 1,
                        reason: None,
                        occurred_at: Utc::now(),
                    }),
                    |id| Product::empty(ProductId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_rehydration_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("rehydration_depth");

    for depth in [10u64, 100, 1000] {
        let (dispatcher, provider_id, product_id) = sourced_setup();
        for _ in 0..depth {
            dispatcher
                .dispatch::<Product>(
                    product_id.0,
                    "catalog.product",
                    ProductCommand::AdjustStock(AdjustStock {
                        provider_id,
                        product_id,
                        direction: StockDirection::Increment,
                        amount: 1,
                        reason: None,
                        occurred_at: Utc::now(),
                    }),
                    |id| Product::empty(ProductId::new(id)),
                )
                .unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                dispatcher
                    .dispatch::<Product>(
                        product_id.0,
                        "catalog.product",
                        ProductCommand::AdjustStock(AdjustStock {
                            provider_id,
                            product_id,
                            direction: StockDirection::Increment,
                            amount: 1,
                            reason: None,
                            occurred_at: Utc::now(),
                        }),
                        |id| Product::empty(ProductId::new(id)),
                    )
                    .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stock_adjustment, bench_rehydration_depth);
criterion_main!(benches);
