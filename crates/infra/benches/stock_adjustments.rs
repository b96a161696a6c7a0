use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;
use std::thread;

use serde_json::Value as JsonValue;
use stockroom_core::{AggregateId, UserId};
use stockroom_events::{EventEnvelope, InMemoryEventBus};
use stockroom_infra::command_dispatcher::CommandDispatcher;
use stockroom_infra::config::LedgerConfig;
use stockroom_infra::event_store::InMemoryEventStore;
use stockroom_infra::notifications::TracingNotifier;
use stockroom_infra::projections::{StockLevelsProjection, rebuild};
use stockroom_infra::read_model::InMemoryReadStore;
use stockroom_infra::services::{
    AdjustStock, MovementLedger, NewProduct, Pagination, StockAdjustmentService,
};
use stockroom_inventory::{MovementFilter, MovementReason, MovementType, ProductId};

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

fn setup() -> (Store, Arc<StockAdjustmentService<Store, Bus>>) {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));
    let service = StockAdjustmentService::new(dispatcher, Arc::new(TracingNotifier));
    (store, Arc::new(service))
}

fn product(service: &StockAdjustmentService<Store, Bus>, history: usize) -> ProductId {
    let product_id = ProductId::new(AggregateId::new());
    service
        .register_product(
            NewProduct {
                product_id,
                sku: format!("BENCH-{product_id}"),
                name: "Bench item".to_string(),
                initial_stock: 1_000_000,
                low_stock_threshold: 10,
                track_inventory: true,
            },
            UserId::new(),
        )
        .unwrap();
    for _ in 0..history {
        service.adjust(receipt(product_id, 1)).unwrap();
    }
    product_id
}

fn receipt(product_id: ProductId, quantity: i64) -> AdjustStock {
    AdjustStock::new(
        product_id,
        MovementType::Purchase,
        quantity,
        MovementReason::StockReceived,
        UserId::new(),
    )
}

fn bench_adjust_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjust_latency");

    // Rehydration cost grows with the stream.
    for history in [0usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("history", history), &history, |b, &history| {
            let (_, service) = setup();
            let product_id = product(&service, history);
            b.iter(|| black_box(service.adjust(receipt(product_id, black_box(1))).unwrap()));
        });
    }

    group.finish();
}

fn bench_contended_adjustments(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_adjustments");
    group.sample_size(20);

    for writers in [1usize, 4, 8] {
        const PER_WRITER: usize = 25;
        group.throughput(Throughput::Elements((writers * PER_WRITER) as u64));
        group.bench_with_input(BenchmarkId::new("writers", writers), &writers, |b, &writers| {
            b.iter(|| {
                let (_, service) = setup();
                let product_id = product(&service, 0);
                let handles: Vec<_> = (0..writers)
                    .map(|_| {
                        let service = service.clone();
                        thread::spawn(move || {
                            for _ in 0..PER_WRITER {
                                service.adjust(receipt(product_id, 1)).unwrap();
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_bulk(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_adjust");

    for items in [10usize, 100] {
        group.throughput(Throughput::Elements(items as u64));
        group.bench_with_input(BenchmarkId::new("items", items), &items, |b, &items| {
            let (_, service) = setup();
            let products: Vec<_> = (0..items).map(|_| product(&service, 0)).collect();
            b.iter(|| {
                let batch = products.iter().map(|p| receipt(*p, 2)).collect();
                black_box(service.adjust_bulk(batch))
            });
        });
    }

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_reads");

    let (store, service) = setup();
    let product_id = product(&service, 1000);
    let ledger = MovementLedger::new(store.clone(), Arc::new(LedgerConfig::default()));

    group.bench_function("history_first_page", |b| {
        b.iter(|| {
            black_box(
                ledger
                    .history(product_id, &MovementFilter::default(), Pagination::first(50))
                    .unwrap(),
            )
        });
    });

    group.bench_function("stats_30_days", |b| {
        b.iter(|| black_box(ledger.stats(product_id, Some(30)).unwrap()));
    });

    group.bench_function("stock_levels_rebuild", |b| {
        let projection = StockLevelsProjection::new(InMemoryReadStore::new());
        b.iter(|| black_box(rebuild(&projection, &store).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_adjust_latency,
    bench_contended_adjustments,
    bench_bulk,
    bench_reads
);
criterion_main!(benches);
