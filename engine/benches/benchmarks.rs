//! Performance benchmarks for beanline-engine

use std::sync::Arc;

use automerge::sync;
use beanline_engine::{
    codec, fixtures, generator, Document, DocumentStore, FieldChange, PeerTable,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

fn catalog(size: usize) -> Document {
    let mut rng = StdRng::seed_from_u64(size as u64);
    let mut seed = fixtures::seed_records();
    seed.extend((seed.len()..size).map(|_| generator::generate_record(&mut rng)));
    Document::seeded(&seed).expect("seed")
}

fn bench_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");

    for size in [10, 100, 1000] {
        let doc = catalog(size);

        group.bench_with_input(BenchmarkId::new("snapshot", size), &doc, |b, doc| {
            b.iter(|| black_box(doc.records()))
        });

        group.bench_with_input(BenchmarkId::new("save", size), &doc, |b, doc| {
            b.iter(|| black_box(doc.save()))
        });

        let bytes = doc.save();
        group.bench_with_input(BenchmarkId::new("load", size), &bytes, |b, bytes| {
            b.iter(|| Document::load(black_box(bytes)).expect("load"))
        });
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for peers in [1, 10, 100] {
        let doc = catalog(100);
        group.bench_with_input(BenchmarkId::new("fresh_peers", peers), &peers, |b, &peers| {
            b.iter(|| {
                let table = PeerTable::new();
                let (tx, _rx) = mpsc::unbounded_channel::<String>();
                let tx = Arc::new(tx);
                for _ in 0..peers {
                    table.open(Some(tx.clone()));
                }
                black_box(table.drain_all(&doc))
            })
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    // Full first sync of a catalog into an empty replica.
    for size in [10, 100, 1000] {
        let source = catalog(size);
        group.bench_with_input(BenchmarkId::new("initial_sync", size), &source, |b, source| {
            b.iter(|| {
                let mut source = source.clone();
                let mut target = Document::empty();
                let mut source_state = sync::State::new();
                let mut target_state = sync::State::new();
                loop {
                    let mut moved = false;
                    if let Some(message) = source.generate_sync_message(&mut source_state) {
                        let message = codec::decode_message(&codec::encode_message(message))
                            .expect("decode");
                        target
                            .receive_sync_message(&mut target_state, message)
                            .expect("receive");
                        moved = true;
                    }
                    if let Some(message) = target.generate_sync_message(&mut target_state) {
                        source
                            .receive_sync_message(&mut source_state, message)
                            .expect("receive");
                        moved = true;
                    }
                    if !moved {
                        break;
                    }
                }
                black_box(target)
            })
        });
    }

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let runtime = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("store");

    group.bench_function("mutate_field", |b| {
        let store = DocumentStore::init(&fixtures::seed_records(), None).expect("store");
        b.to_async(&runtime).iter(|| async {
            store
                .mutate_field("nebula", FieldChange::Stock { delta: 1 })
                .await
                .expect("mutate")
        })
    });

    group.bench_function("mutate_field_with_peers", |b| {
        let store = Arc::new(DocumentStore::init(&fixtures::seed_records(), None).expect("store"));
        let (tx, _rx) = mpsc::unbounded_channel::<String>();
        let tx = Arc::new(tx);
        let _sessions: Vec<_> = (0..10)
            .map(|_| runtime.block_on(store.open_sync_channel(tx.clone())))
            .collect();

        b.to_async(&runtime).iter(|| async {
            store
                .mutate_field("zenith", FieldChange::Stock { delta: -1 })
                .await
                .expect("mutate")
        })
    });

    group.finish();
}

criterion_group!(benches, bench_document, bench_drain, bench_merge, bench_store);
criterion_main!(benches);
