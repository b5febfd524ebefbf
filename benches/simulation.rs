//! Tick and snapshot benchmarks for the Gunline server
//!
//! Run with: cargo bench --bench simulation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gunline_server::config::SimConfig;
use gunline_server::game::clock::WorldClock;
use gunline_server::game::entities::Turret;
use gunline_server::game::spatial::CollisionMap;
use gunline_server::game::state::{PlayerId, TeamId};
use gunline_server::game::world::World;
use gunline_server::net::protocol::SnapLayout;
use gunline_server::net::snapshot::{SnapshotBuilder, SnapshotLimits};
use gunline_server::net::viewer::ViewerInfo;
use gunline_server::util::vec2::Vec2;
use rand::Rng;

/// Arena of `turrets` turrets and a full client roster spread at random
fn create_world(turrets: usize) -> World {
    let mut world = World::with_clock(CollisionMap::open(200, 200), WorldClock::starting_at(1000, 50));
    let mut rng = rand::thread_rng();
    let size = world.map().world_size();

    for _ in 0..turrets {
        let position = Vec2::new(rng.gen_range(0.0..size.x), rng.gen_range(0.0..size.y));
        world.spawn_turret(
            Turret::new(position, 0)
                .with_freeze(rng.gen_bool(0.5))
                .with_explosive(rng.gen_bool(0.3)),
        );
    }

    for (i, player) in PlayerId::all().enumerate() {
        let position = Vec2::new(rng.gen_range(0.0..size.x), rng.gen_range(0.0..size.y));
        if world.spawn_character(player, position).is_err() {
            continue;
        }
        let _ = world.set_team(player, TeamId::new(i % 8).unwrap_or(TeamId::FLOCK));
        let _ = world.set_velocity(player, Vec2::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0)));
    }

    world
}

/// Benchmark a full world tick at various turret counts
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(50);
    let config = SimConfig::default();

    for count in [16, 64, 256, 1024] {
        let mut world = create_world(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("turrets", count), &count, |b, _| {
            b.iter(|| black_box(world.tick(&config)));
        });
    }

    group.finish();
}

/// Benchmark snapshot encoding per layout
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let mut world = create_world(256);
    let config = SimConfig::default();
    // Let a few volleys of plasma into the world
    for _ in 0..20 {
        world.tick(&config);
    }

    let demo = ViewerInfo::demo();
    let legacy = ViewerInfo {
        layout: SnapLayout::Legacy,
        view_pos: Vec2::new(3200.0, 3200.0),
        team: Some(TeamId::FLOCK),
        clips: true,
    };

    for (name, viewer) in [("extended_full_map", demo), ("legacy_clipped", legacy)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut builder = SnapshotBuilder::new(world.current_tick(), SnapshotLimits::default());
                world.snap(black_box(&viewer), &mut builder);
                black_box(builder.finish())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_snapshot);
criterion_main!(benches);
