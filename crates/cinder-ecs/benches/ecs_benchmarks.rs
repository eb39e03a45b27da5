use std::hint::black_box;

use cinder_ecs::prelude::*;
use criterion::*;
use serde::{Deserialize, Serialize};

const ENTITIES: usize = 10_000;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Velocity {
    dx: f32,
    dy: f32,
    dz: f32,
}

impl Component for Velocity {
    fn update(&mut self, ctx: &mut Context<'_>) {
        let dt = ctx.time().delta as f32;
        let entity = ctx.entity();
        let (dx, dy, dz) = (self.dx * dt, self.dy * dt, self.dz * dt);
        if let Some(transform) = ctx.get_component_mut::<Transform>(entity) {
            transform.translate([dx, dy, dz]);
        }
    }
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register::<Velocity>("velocity")
        .expect("velocity registration failed in benchmark");
    registry
}

fn populated(count: usize) -> (EntityManager, Vec<EntityId>) {
    let mut manager = EntityManager::new(registry());
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let e = manager.create_entity("").expect("create failed in benchmark");
        manager
            .insert(e, Velocity { dx: i as f32, dy: 1.0, dz: 0.0 })
            .expect("insert failed in benchmark");
        ids.push(e);
    }
    (manager, ids)
}

fn allocate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    group.throughput(Throughput::Elements(ENTITIES as u64));
    group.bench_function("create_10k_with_velocity", |b| {
        b.iter(|| black_box(populated(ENTITIES)));
    });
    group.finish();
}

fn update_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(ENTITIES as u64));

    let (mut manager, _) = populated(ENTITIES);
    manager.start_all();
    manager.set_frame_time(FrameTime {
        delta: 1.0 / 60.0,
        ..FrameTime::default()
    });
    group.bench_function("update_all_10k", |b| {
        b.iter(|| black_box(manager.update_all()));
    });

    let (mut manager, _) = populated(ENTITIES);
    group.bench_function("for_each_10k", |b| {
        b.iter(|| {
            manager.for_each::<Velocity>(|velocity, _| {
                velocity.dy += 1.0;
            })
        });
    });
    group.finish();
}

fn destroy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("destroy");
    for count in [100usize, 1_000, ENTITIES] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("destroy_entity", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || populated(count),
                    |(mut manager, ids)| {
                        // Front-to-back erasure is the worst case for compaction.
                        for e in ids {
                            manager.destroy_entity(e);
                        }
                        manager
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, allocate_benchmark, update_benchmark, destroy_benchmark);
criterion_main!(benches);
