use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use umbra_core::math::Color;
use umbra_data::RidAllocator;
use umbra_infra::HeadlessBackend;
use umbra_server::queue::CommandQueue;
use umbra_server::ServerState;

fn state() -> ServerState {
    ServerState::new(
        Box::new(HeadlessBackend::new()),
        Arc::new(RidAllocator::new()),
        Color::BLACK,
    )
}

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("Command Queue");

    group.bench_function("Submit + Drain 10k (single producer)", |b| {
        let queue = CommandQueue::new(usize::MAX);
        let mut state = state();
        b.iter(|| {
            for i in 0..10_000u64 {
                queue.submit("bench", move |s| {
                    s.frame = black_box(i);
                    Ok(())
                });
            }
            black_box(queue.drain(&mut state));
        });
    });

    group.bench_function("Submit 10k (4 producers) + Drain", |b| {
        let queue = Arc::new(CommandQueue::new(usize::MAX));
        let mut state = state();
        b.iter(|| {
            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..2_500u64 {
                            queue.submit("bench", move |s| {
                                s.frame = black_box(i);
                                Ok(())
                            });
                        }
                    })
                })
                .collect();
            for producer in producers {
                let _ = producer.join();
            }
            black_box(queue.drain(&mut state));
        });
    });

    group.finish();
}

fn bench_handles(c: &mut Criterion) {
    let allocator = RidAllocator::new();
    c.bench_function("Allocate + Retire 10k handles", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..10_000)
                .map(|_| allocator.allocate(umbra_core::ResourceKind::Mesh))
                .collect();
            for rid in handles {
                let _ = black_box(allocator.retire(rid));
            }
        });
    });
}

criterion_group!(benches, bench_queue, bench_handles);
criterion_main!(benches);
