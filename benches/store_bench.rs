//! Benchmarks for CairnKV store operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use cairnkv::journal::{replay, Journal, Operation};
use cairnkv::{State, Store, Value};
use tempfile::TempDir;

fn write_journal(journal: &std::path::Path, count: usize) {
    let mut writer = Journal::create(journal).unwrap();
    for i in 0..count {
        let value = Value::Text(format!("value-{}", i));
        writer.log(Operation::Set, &format!("key-{}", i), Some(&value)).unwrap();
    }
    writer.close().unwrap();
}

fn store_benchmarks(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();

    // Single key write throughput (buffered, no flush)
    let store = Store::open(temp.path().join("set.db"), temp.path().join("set.wal")).unwrap();
    let mut i: i64 = 0;
    c.bench_function("set_buffered", |b| {
        b.iter(|| {
            store.set(format!("key-{}", i % 10_000), i).unwrap();
            i += 1;
        })
    });

    // Read throughput
    c.bench_function("get_hit", |b| {
        b.iter(|| store.get("key-42").unwrap())
    });
    store.close().unwrap();

    // Replay of a 10k-record journal
    let journal = temp.path().join("replay.wal");
    write_journal(&journal, 10_000);
    c.bench_function("replay_10k", |b| {
        b.iter(|| {
            let mut state = State::new();
            replay(&journal, &mut state).unwrap();
            state
        })
    });

    // Coalesce of 10k keys
    c.bench_function("coalesce_10k", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let store = Store::open(dir.path().join("c.db"), dir.path().join("c.wal")).unwrap();
                for i in 0..10_000i64 {
                    store.set(format!("key-{}", i), i).unwrap();
                }
                (dir, store)
            },
            |(_dir, store)| store.coalesce().unwrap(),
            BatchSize::PerIteration,
        )
    });
}

criterion_group!(benches, store_benchmarks);
criterion_main!(benches);
