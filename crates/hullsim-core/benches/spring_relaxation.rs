//! Spring relaxation and full-step benchmarks on a 60×20 grid ship.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hullsim_core::prelude::*;

fn grid_ship(params: &SimulationParameters) -> Ship {
    let mut builder = ShipBuilder::new();
    let steel = builder.add_material(MaterialPreset::Steel.material());
    builder.add_grid(60, 20, 1.0, Vec2f::new(-30.0, -5.0), steel);
    Ship::new(0, &builder, ShipCollaborators::new(CalmSea::default()), params, 1).expect("valid grid")
}

fn bench_spring_relaxation(c: &mut Criterion) {
    let params = SimulationParameters::default();
    let mut ship = grid_ship(&params);

    c.bench_function("spring_relaxation_60x20", |b| {
        b.iter(|| ship.run_spring_relaxation(black_box(&params)));
    });
}

fn bench_full_update(c: &mut Criterion) {
    let params = SimulationParameters::default();
    let storm = StormParameters::default();
    let threads = ThreadManager::with_available_parallelism().expect("thread pool");
    let mut ship = grid_ship(&params);
    let mut perf = PerfStats::new();
    let mut aabbs = AabbSet::new();
    let mut step = 0u32;

    c.bench_function("ship_update_60x20", |b| {
        b.iter(|| {
            step += 1;
            aabbs.clear();
            ship.update(
                step as f32 * SIMULATION_STEP_TIME_DURATION,
                &storm,
                black_box(&params),
                StressRenderMode::None,
                &mut aabbs,
                &threads,
                &mut perf,
            );
            ship.update_end();
        });
    });
}

criterion_group!(benches, bench_spring_relaxation, bench_full_update);

criterion_main!(benches);
