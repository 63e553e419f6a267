//! Throughput Benchmark for PoolKV
//!
//! Measures the storage engine, the command path from raw payload to reply,
//! and the hand-off queue between acceptor and workers.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use poolkv::commands::CommandHandler;
use poolkv::protocol::{encode_frame, tokenize, FrameCodec};
use poolkv::queue::BoundedQueue;
use poolkv::storage::StorageEngine;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Benchmark create/delete pairs
fn bench_create(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("create");
    group.throughput(Throughput::Elements(1));

    group.bench_function("create_small", |b| {
        let mut i = 0i32;
        let value = Bytes::from("small_value");
        b.iter(|| {
            let _ = engine.create(i, value.clone());
            let _ = engine.delete(i);
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("create_large", |b| {
        let mut i = 0i32;
        let value = Bytes::from("x".repeat(64 * 1024)); // 64KB value
        b.iter(|| {
            let _ = engine.create(i, value.clone());
            let _ = engine.delete(i);
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

/// Benchmark read operations
fn bench_read(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        let _ = engine.create(i, Bytes::from(format!("value:{}", i)));
    }

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Elements(1));

    group.bench_function("read_existing", |b| {
        let mut i = 0i32;
        b.iter(|| {
            black_box(engine.read(i % 100_000).ok());
            i = i.wrapping_add(1);
        });
    });

    group.bench_function("read_missing", |b| {
        let mut i = 0i32;
        b.iter(|| {
            black_box(engine.read(-1 - (i % 100_000)).ok());
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% updates)
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..10_000 {
        let _ = engine.create(i, Bytes::from(format!("value:{}", i)));
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_update", |b| {
        let mut i = 0i32;
        let value = Bytes::from("updated");
        b.iter(|| {
            let key = i % 10_000;
            if i % 5 == 0 {
                let _ = engine.update(key, value.clone());
            } else {
                black_box(engine.read(key).ok());
            }
            i = i.wrapping_add(1) & i32::MAX;
        });
    });

    group.finish();
}

/// Benchmark the request path: decode frame, tokenize, dispatch
fn bench_command_path(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
    let _ = handler.execute(&Bytes::from("create 1 5 hello"));

    let codec = FrameCodec::default();
    let frame = encode_frame(b"read 1").freeze();

    let mut group = c.benchmark_group("command");
    group.throughput(Throughput::Elements(1));

    group.bench_function("tokenize", |b| {
        let payload = Bytes::from("update 12345 11 hello world");
        b.iter(|| black_box(tokenize(&payload)));
    });

    group.bench_function("frame_to_reply", |b| {
        b.iter(|| {
            let mut input = Cursor::new(&frame[..]);
            if let Ok(Some(payload)) = codec.read_frame(&mut input) {
                black_box(handler.execute(&payload));
            }
        });
    });

    group.finish();
}

/// Benchmark queue hand-off
fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_thread_insert_retrieve", |b| {
        let queue = BoundedQueue::new(1024);
        b.iter(|| {
            let _ = queue.insert(1u64);
            black_box(queue.retrieve());
        });
    });

    group.bench_function("1_producer_4_consumers", |b| {
        b.iter(|| {
            let queue = Arc::new(BoundedQueue::new(64));
            let consumers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut n = 0u64;
                        while queue.retrieve().is_some() {
                            n += 1;
                        }
                        n
                    })
                })
                .collect();

            for i in 0..10_000u64 {
                let _ = queue.insert(i);
            }
            queue.close();

            let total: u64 = consumers.into_iter().map(|h| h.join().unwrap()).sum();
            black_box(total);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_create,
    bench_read,
    bench_mixed,
    bench_command_path,
    bench_queue,
);

criterion_main!(benches);
