//! Registry benchmarks for scribe-core.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scribe_core::{ConnectionHandle, PayloadReceiver, Registry};

fn populated(room: &str, members: usize) -> (Registry, Vec<ConnectionHandle>, Vec<PayloadReceiver>) {
    let registry = Registry::new();
    let mut handles = Vec::with_capacity(members);
    let mut receivers = Vec::with_capacity(members);
    for _ in 0..members {
        let (handle, rx) = ConnectionHandle::channel();
        registry.join(room, handle.clone()).unwrap();
        handles.push(handle);
        receivers.push(rx);
    }
    (registry, handles, receivers)
}

fn bench_join_leave(c: &mut Criterion) {
    let registry = Registry::new();

    c.bench_function("join_leave", |b| {
        b.iter(|| {
            let (handle, _rx) = ConnectionHandle::channel();
            let id = handle.id().clone();
            registry.join(black_box("bench"), handle).unwrap();
            registry.leave(black_box("bench"), &id)
        })
    });
}

fn bench_publish_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_edit");

    for members in [2usize, 10, 50] {
        let (registry, handles, mut receivers) = populated("bench", members);
        let sender = handles[0].id().clone();
        let content = "x".repeat(1024);

        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, _| {
            b.iter(|| {
                let delivered =
                    registry.publish_edit("bench", &sender, "Red Panda", black_box(content.clone()));
                for rx in receivers.iter_mut() {
                    while rx.try_recv().is_ok() {}
                }
                delivered
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_join_leave, bench_publish_edit);
criterion_main!(benches);
