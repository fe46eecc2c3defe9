//! End-to-end ship scenarios through the public API.
//!
//! Exercises: ShipBuilder → Ship::new → update loop → damage, repair,
//! sinking and snapshots, checking structural invariants along the way.

use hullsim_core::prelude::*;

// ── Helpers ────────────────────────────────────────────────────────────

struct Harness {
    ship: Ship,
    params: SimulationParameters,
    recorder: EventRecorder,
    threads: ThreadManager,
    perf: PerfStats,
    step: u32,
}

impl Harness {
    fn new(builder: &ShipBuilder, seed: u64) -> Self {
        let params = SimulationParameters::default();
        let recorder = EventRecorder::new();
        let collaborators = ShipCollaborators::new(CalmSea::default()).with_events(recorder.clone());
        let ship = Ship::new(0, builder, collaborators, &params, seed).expect("valid ship");
        Self {
            ship,
            params,
            recorder,
            threads: ThreadManager::new(2).expect("thread pool"),
            perf: PerfStats::new(),
            step: 0,
        }
    }

    fn now(&self) -> f32 {
        self.step as f32 * SIMULATION_STEP_TIME_DURATION
    }

    fn run(&mut self, steps: u32) {
        let mut aabbs = AabbSet::new();
        for _ in 0..steps {
            self.step += 1;
            aabbs.clear();
            self.ship.update(
                self.now(),
                &StormParameters::default(),
                &self.params,
                StressRenderMode::None,
                &mut aabbs,
                &self.threads,
                &mut self.perf,
            );
            self.ship.update_end();
        }
    }
}

/// Fully braced grid, unit spacing, bottom-left corner at `origin`.
fn grid_builder(cols: usize, rows: usize, origin: Vec2f, preset: MaterialPreset) -> ShipBuilder {
    let mut builder = ShipBuilder::new();
    let material = builder.add_material(preset.material());
    builder.add_grid(cols, rows, 1.0, origin, material);
    builder
}

fn deleted_springs(ship: &Ship) -> Vec<bool> {
    (0..ship.springs().element_count())
        .map(|s| ship.springs().is_deleted(s))
        .collect()
}

// ── Mechanics ──────────────────────────────────────────────────────────

#[test]
fn spring_at_rest_stays_at_rest() {
    let mut builder = ShipBuilder::new();
    let wood = builder.add_material(MaterialPreset::Wood.material());
    let a = builder.add_point(Vec2f::new(0.0, 20.0), wood);
    let b = builder.add_point(Vec2f::new(1.0, 20.0), wood);
    builder.add_spring(a, b);
    let mut h = Harness::new(&builder, 1);

    // No static forces have been applied yet, so only the spring acts
    h.ship.run_spring_relaxation(&h.params);

    assert_eq!(h.ship.points().position(a), Vec2f::new(0.0, 20.0));
    assert_eq!(h.ship.points().position(b), Vec2f::new(1.0, 20.0));
    assert_eq!(h.ship.points().velocity(a), Vec2f::ZERO);
    assert_eq!(h.ship.points().velocity(b), Vec2f::ZERO);
}

#[test]
fn falling_ship_keeps_its_structure() {
    let mut h = Harness::new(&grid_builder(8, 4, Vec2f::new(-4.0, 30.0), MaterialPreset::Steel), 5);
    let top_before = h.ship.points().position(31).y;

    h.run(60);

    assert!(h.ship.points().position(31).y < top_before, "gravity pulls the ship down");
    assert!(h.ship.damage().is_pristine());
    assert_eq!(h.ship.verify_invariants(), Ok(()));
    assert_eq!(h.ship.current_simulation_sequence_number(), 60);
    assert_eq!(h.perf.update_count, 60);
}

#[test]
fn overstretched_spring_breaks() {
    let mut brittle = MaterialPreset::Wood.material();
    brittle.strength = 0.0001;
    let mut builder = ShipBuilder::new();
    let material = builder.add_material(brittle);
    builder.add_grid(2, 2, 1.0, Vec2f::new(0.0, 40.0), material);
    let mut h = Harness::new(&builder, 9);

    // Yank the top-right corner away from its neighbors
    h.ship.pull(3, Vec2f::new(6.0, 46.0), 1.0);
    h.run(3);

    assert!(deleted_springs(&h.ship).iter().any(|&d| d));
    assert!(h.ship.damage().broken_springs > 0);
    assert!(h.ship.points().is_damaged(3));
    assert!(h.recorder.count(|e| matches!(e, SimulationEvent::Break { .. })) > 0);
    assert_eq!(h.ship.verify_invariants(), Ok(()));
}

#[test]
fn equal_seeds_give_identical_runs() {
    let builder = grid_builder(6, 3, Vec2f::new(-3.0, 2.0), MaterialPreset::Wood);
    let mut first = Harness::new(&builder, 77);
    let mut second = Harness::new(&builder, 77);

    for h in [&mut first, &mut second] {
        h.ship.apply_blast_at(Vec2f::new(0.0, 3.0), 4.0, 2.0);
        h.run(40);
    }

    for p in first.ship.points().raw_ship_points() {
        assert_eq!(first.ship.points().position(p), second.ship.points().position(p));
        assert_eq!(first.ship.points().water(p), second.ship.points().water(p));
    }
    assert_eq!(deleted_springs(&first.ship), deleted_springs(&second.ship));
}

#[test]
fn cut_strip_splits_into_two_planes() {
    let mut h = Harness::new(&grid_builder(5, 2, Vec2f::new(0.0, 30.0), MaterialPreset::Wood), 14);
    assert_eq!(h.ship.connectivity().plane_count(), 1);

    // Detach the middle column: points 2 and 7
    let now = h.now();
    h.ship.destroy_at(Vec2f::new(2.0, 30.5), 0.6, now, &h.params);
    h.run(1);

    let plane = |p: usize| h.ship.points().plane_id(p);
    assert!(h.ship.connectivity().plane_count() >= 2);
    for left in [1, 5, 6] {
        assert_eq!(plane(left), plane(0));
    }
    for right in [4, 8, 9] {
        assert_eq!(plane(right), plane(3));
    }
    assert_ne!(plane(0), plane(3));
    assert_eq!(h.ship.verify_invariants(), Ok(()));
}

#[test]
fn submerged_decay_only_goes_down() {
    let mut h = Harness::new(&grid_builder(4, 2, Vec2f::new(-2.0, -6.0), MaterialPreset::Steel), 16);
    h.params.rot_accelerator = 1000.0;
    let decays = |ship: &Ship| -> Vec<f32> { ship.points().raw_ship_points().map(|p| ship.points().decay(p)).collect() };

    let mut previous = decays(&h.ship);
    for _ in 0..60 {
        h.run(1);
        let current = decays(&h.ship);
        for (before, now) in previous.iter().zip(&current) {
            assert!(now <= before, "decay rose from {} to {}", before, now);
            assert!(*now > 0.0 && *now <= 1.0);
        }
        previous = current;
    }

    assert!(previous.iter().all(|&d| d < 1.0));
}

// ── Water ──────────────────────────────────────────────────────────────

#[test]
fn flooded_ship_starts_sinking_once() {
    let mut builder = grid_builder(4, 4, Vec2f::new(-2.0, -9.0), MaterialPreset::Wood);
    for p in 0..builder.point_count() {
        builder.set_point_leaking(p);
    }
    let mut h = Harness::new(&builder, 3);
    assert!(!h.ship.is_sinking());

    h.run(120);

    assert!(h.ship.is_sinking());
    assert_eq!(h.recorder.count(|e| matches!(e, SimulationEvent::SinkingBegin(0))), 1);
    assert_eq!(h.recorder.count(|e| matches!(e, SimulationEvent::SinkingEnd(_))), 0);
    assert_eq!(h.ship.verify_invariants(), Ok(()));
}

#[test]
fn dry_ship_above_water_takes_no_water() {
    let mut h = Harness::new(&grid_builder(4, 2, Vec2f::new(0.0, 50.0), MaterialPreset::Wood), 4);

    h.run(30);

    let total: f32 = h
        .ship
        .points()
        .raw_ship_points()
        .map(|p| h.ship.points().water(p))
        .sum();
    assert_eq!(total, 0.0);
    assert!(!h.ship.is_sinking());
}

#[test]
fn closing_door_on_broken_point_stops_the_leak() {
    let mut h = Harness::new(&grid_builder(3, 3, Vec2f::new(-1.0, -4.0), MaterialPreset::Wood), 6);
    let center = h.ship.points().position(4);
    let now = h.now();
    h.ship.destroy_at(center, 0.1, now, &h.params);
    assert!(h.ship.points().leaking(4).is_cumulatively_leaking());

    h.ship.set_watertight_door(4, false);
    assert!(h.ship.points().is_hull(4));
    assert!(!h.ship.points().leaking(4).is_cumulatively_leaking());

    h.run(20);
    assert_eq!(h.ship.points().water(4), 0.0);
    assert_eq!(h.ship.verify_invariants(), Ok(()));

    h.ship.set_watertight_door(4, true);
    assert_eq!(h.ship.points().leaking(4).structural_leak, 1.0);
    h.run(20);
    assert!(h.ship.points().water(4) > 0.0);
}

// ── Destroy and repair ─────────────────────────────────────────────────

#[test]
fn destroy_then_repair_keeps_invariants() {
    let mut h = Harness::new(&grid_builder(6, 6, Vec2f::new(0.0, 60.0), MaterialPreset::Wood), 12);
    let pristine_cycles = h.ship.frontiers().canonical_cycles();

    let now = h.now();
    let recorded = h.ship.destroy_at(Vec2f::new(2.5, 62.5), 0.8, now, &h.params);
    assert!(!recorded.is_empty());
    assert!(!h.ship.damage().is_pristine());
    assert_eq!(h.ship.verify_invariants(), Ok(()));

    // Detached points have not moved yet, so everything fits back
    assert!(h.ship.repair_at(Vec2f::new(2.5, 62.5), 3.0, now));
    assert_eq!(h.ship.repair_grace_period_multiplier(), 0.0);
    assert!(h.ship.damage().is_pristine());
    assert_eq!(h.ship.frontiers().canonical_cycles(), pristine_cycles);
    assert_eq!(h.recorder.count(|e| matches!(e, SimulationEvent::ShipRepaired(0))), 1);
    assert_eq!(h.ship.verify_invariants(), Ok(()));

    h.run(30);
    assert_eq!(h.ship.repair_grace_period_multiplier(), 1.0);
    assert_eq!(h.ship.verify_invariants(), Ok(()));
}

#[test]
fn recorded_destroy_replays_on_twin() {
    let builder = grid_builder(4, 4, Vec2f::new(0.0, 20.0), MaterialPreset::Wood);
    let mut original = Harness::new(&builder, 21);
    let mut twin = Harness::new(&builder, 21);

    let now = original.now();
    let recorded = original.ship.destroy_at(Vec2f::new(1.5, 21.5), 1.0, now, &original.params);
    for event in &recorded {
        twin.ship.replay_recorded_event(event, &twin.params);
    }

    assert_eq!(deleted_springs(&original.ship), deleted_springs(&twin.ship));
    assert_eq!(
        original.ship.frontiers().canonical_cycles(),
        twin.ship.frontiers().canonical_cycles()
    );
    assert_eq!(twin.ship.verify_invariants(), Ok(()));
}

#[test]
fn explosion_runs_to_completion() {
    let mut h = Harness::new(&grid_builder(6, 4, Vec2f::new(-3.0, 30.0), MaterialPreset::Wood), 8);
    let request = ExplosionRequest {
        plane_id: 0,
        center: Vec2f::new(0.0, 31.5),
        blast_force: 1.0,
        blast_force_radius: 3.0,
        blast_heat: 50.0,
        blast_heat_radius: 3.0,
        kind: ExplosionType::Deflagration,
    };
    let now = h.now();
    h.ship.start_explosion(now, &request);
    assert_eq!(h.ship.state_machines().len(), 1);

    // One simulated second, and a bit
    h.run(70);

    assert!(h.ship.state_machines().is_empty());
    assert_eq!(
        h.recorder
            .count(|e| matches!(e, SimulationEvent::ExplosionStarted(ExplosionType::Deflagration))),
        1
    );
    assert_eq!(h.ship.verify_invariants(), Ok(()));
}

// ── Snapshots ──────────────────────────────────────────────────────────

#[test]
fn snapshot_restores_a_damaged_run() {
    let builder = grid_builder(5, 5, Vec2f::new(0.0, 25.0), MaterialPreset::Wood);
    let mut h = Harness::new(&builder, 30);
    h.run(10);
    let now = h.now();
    h.ship.destroy_at(Vec2f::new(2.0, 27.0), 0.6, now, &h.params);
    h.run(10);

    let mut saved = Vec::new();
    save_snapshot(&h.ship, &mut saved).expect("Save failed");

    let mut restored = Harness::new(&builder, 30);
    load_snapshot(&mut restored.ship, &saved[..], &restored.params).expect("Load failed");

    assert_eq!(restored.ship.current_simulation_sequence_number(), 20);
    assert_eq!(deleted_springs(&restored.ship), deleted_springs(&h.ship));
    for p in h.ship.points().raw_ship_points() {
        assert_eq!(restored.ship.points().position(p), h.ship.points().position(p));
    }
    assert_eq!(
        restored.ship.frontiers().canonical_cycles(),
        h.ship.frontiers().canonical_cycles()
    );
    assert_eq!(restored.ship.verify_invariants(), Ok(()));
}

#[test]
fn snapshot_of_another_mesh_is_rejected() {
    let small = Harness::new(&grid_builder(3, 3, Vec2f::new(0.0, 10.0), MaterialPreset::Wood), 1);
    let mut saved = Vec::new();
    save_snapshot(&small.ship, &mut saved).expect("Save failed");

    let mut big = Harness::new(&grid_builder(3, 4, Vec2f::new(0.0, 10.0), MaterialPreset::Wood), 1);
    let err = load_snapshot(&mut big.ship, &saved[..], &big.params).unwrap_err();
    assert!(matches!(err, SnapshotError::ShapeMismatch { what: "point", .. }));
}
