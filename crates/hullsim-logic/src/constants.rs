//! Simulation constants: world extents, physical properties and tuning values.
//!
//! Grouped by concern; every value is a plain `const` usable from both the
//! core engine and the headless harness.

/// Fixed simulation clock and world extents.
pub mod world_constants {
    /// Duration of one simulation step, in seconds (64 steps per second).
    pub const SIMULATION_STEP_TIME_DURATION: f32 = 1.0 / 64.0;

    pub const MAX_WORLD_WIDTH: f32 = 10000.0;
    pub const HALF_MAX_WORLD_WIDTH: f32 = MAX_WORLD_WIDTH / 2.0;
    pub const MAX_WORLD_HEIGHT: f32 = 22000.0;
    pub const HALF_MAX_WORLD_HEIGHT: f32 = MAX_WORLD_HEIGHT / 2.0;

    /// Deepest supported sea floor.
    pub const MAX_SEA_DEPTH: f32 = 10000.0;
    pub const MIN_SEA_DEPTH: f32 = -50.0;
}

/// Physical properties of air, water and the environment.
pub mod physics_constants {
    use crate::vectors::Vec2f;

    pub const GRAVITY: Vec2f = Vec2f::new(0.0, -9.80);
    pub const GRAVITY_MAGNITUDE: f32 = 9.80;

    /// Mass of one cubic meter of air, in Kg.
    pub const AIR_MASS: f32 = 1.2754;
    /// Mass of one cubic meter of water, in Kg.
    pub const WATER_MASS: f32 = 1000.0;

    /// Reference temperature (25C), in Kelvin.
    pub const TEMPERATURE_0: f32 = 298.15;

    pub const AIR_THERMAL_EXPANSION_COEFFICIENT: f32 = 0.0034;
    pub const WATER_THERMAL_EXPANSION_COEFFICIENT: f32 = 0.000207;

    /// Pa
    pub const AIR_PRESSURE_AT_SEA_LEVEL: f32 = 101325.0;

    pub const AIR_FRICTION_DRAG_COEFFICIENT: f32 = 0.003;
    pub const AIR_PRESSURE_DRAG_COEFFICIENT: f32 = 5.0;
    pub const WATER_FRICTION_DRAG_COEFFICIENT: f32 = 0.75;
    pub const WATER_PRESSURE_DRAG_COEFFICIENT: f32 = 1030.0;

    /// J/(s*m2*K)
    pub const AIR_CONVECTIVE_HEAT_TRANSFER_COEFFICIENT: f32 = 100.45;
    /// J/(s*m2*K)
    pub const WATER_CONVECTIVE_HEAT_TRANSFER_COEFFICIENT: f32 = 2500.0;
}

/// Mechanical dynamics: spring relaxation, integration and collisions.
pub mod dynamics_constants {
    /// Number of relaxation sub-iterations at adjustment 1.0.
    pub const BASIS_NUM_MECHANICAL_DYNAMICS_ITERATIONS: f32 = 40.0;

    /// Fraction of the critical stiffness used for spring stiffness.
    pub const SPRING_REDUCTION_FRACTION: f32 = 0.5;
    pub const SPRING_DAMPING_COEFFICIENT: f32 = 0.03;

    /// Global velocity damping at 12 sub-iterations.
    pub const GLOBAL_DAMPING: f32 = 0.000_107_496_53;
    pub const MAX_GLOBAL_DAMPING_ADJUSTMENT: f32 = 10.0;

    /// Sea floor collisions are resolved every this many sub-iterations.
    pub const SEA_FLOOR_COLLISION_PERIOD: usize = 2;
    /// Tangential velocity above which kinetic rather than static friction applies.
    pub const KINETIC_FRICTION_THRESHOLD: f32 = 2.0;
    /// Square velocity at which the floor stops silting.
    pub const MAX_VELOCITY_FOR_SILTING: f32 = 2.0;
    /// Maximum rollback applied to a point that penetrated the floor.
    pub const MAX_FLOOR_ROLLBACK: f32 = 0.01;

    /// Cap of the velocity reflected off world bounds.
    pub const MAX_BOUNCE_VELOCITY: f32 = 150.0;

    /// Springs un-stress below this fraction of their breaking elongation.
    pub const STRESS_RELEASE_FRACTION: f32 = 0.08;
    /// Half-width of the per-spring random strain threshold jitter.
    pub const STRAIN_THRESHOLD_JITTER: f32 = 0.35;

    /// Rate at which actual mass converges to target mass.
    pub const MASS_CONVERGENCE_RATE: f32 = 0.12;
    /// Rate at which a growing spring stiffness converges to its target.
    pub const STIFFNESS_GROWTH_RATE: f32 = 0.03;

    pub const MAX_SPRINGS_PER_POINT: usize = 8 + 1;
    pub const MAX_TRIANGLES_PER_POINT: usize = 8;
}

/// Staggered low-frequency step offsets within one period.
pub mod low_frequency_constants {
    /// Number of simulation steps in one low-frequency period.
    pub const PERIOD: u64 = 7 * 7;
    /// Number of slices each staggered operation partitions its range into.
    pub const PARTITION_COUNT: usize = 4;

    pub const ROT_POINTS_STEPS: [u64; 4] = [2, 11, 20, 29];
    pub const SPRING_DECAY_AND_TEMPERATURE_STEPS: [u64; 4] = [5, 14, 23, 32];
    pub const COMBUSTION_STEPS: [u64; 4] = [8, 17, 26, 35];
    pub const UPDATE_SINKING_STEP: u64 = 18;
}

/// Heat, combustion and melting.
pub mod heat_constants {
    pub const IGNITION_TEMPERATURE_HIGH_WATERMARK: f32 = 0.0;
    pub const IGNITION_TEMPERATURE_LOW_WATERMARK: f32 = -30.0;

    pub const SMOTHERING_WATER_LOW_WATERMARK: f32 = 0.05;
    pub const SMOTHERING_WATER_HIGH_WATERMARK: f32 = 0.1;

    pub const SMOTHERING_DECAY_LOW_WATERMARK: f32 = 0.0005;
    pub const SMOTHERING_DECAY_HIGH_WATERMARK: f32 = 0.05;

    /// J
    pub const COMBUSTION_HEAT: f32 = 100.0 * 1000.0;

    pub const MAX_IGNITION_CANDIDATES_PER_STEP: usize = 4;
    pub const MAX_EXTRA_IGNITIONS_PER_STEP: usize = 6;
    pub const MAX_EXPLOSION_CANDIDATES_PER_STEP: usize = 10;

    /// Thermocline: water cools by this many degrees over the maximum sea depth.
    pub const THERMOCLINE_DELTA: f32 = 15.0;

    /// Temperature above melting over which springs are fully molten.
    pub const MELTING_OVERHEAT_SPAN: f32 = 200.0;
    /// Stiffness multiplier of a fully molten spring.
    pub const MOLTEN_STIFFNESS_MULTIPLIER: f32 = 0.0002;
}

/// Ephemeral particles.
pub mod particle_constants {
    pub const MAX_EPHEMERAL_PARTICLES: usize = 4096;

    pub const MIN_DEBRIS_PARTICLES_PER_EVENT: usize = 4;
    pub const MAX_DEBRIS_PARTICLES_PER_EVENT: usize = 9;
    pub const MIN_DEBRIS_PARTICLES_VELOCITY: f32 = 12.5;
    pub const MAX_DEBRIS_PARTICLES_VELOCITY: f32 = 20.0;
    pub const MIN_DEBRIS_PARTICLES_LIFETIME: f32 = 0.4;
    pub const MAX_DEBRIS_PARTICLES_LIFETIME: f32 = 0.9;
    pub const DEBRIS_WIND_RECEPTIVITY: f32 = 3.0;

    pub const MAX_AIR_BUBBLES_DENSITY: f32 = 128.0;
    /// Buoyancy volume fill of an air bubble; lower than 1.0 so bubbles rise gently.
    pub const AIR_BUBBLE_BUOYANCY_VOLUME_FILL: f32 = 0.003;
    pub const AIR_BUBBLE_VORTEX_AMPLITUDE: f32 = 4.0;
    pub const AIR_BUBBLE_PHASE_PERIOD: u64 = 10;
    pub const MIN_AIR_BUBBLE_VORTEX_PERIOD: f32 = 1.5;
    pub const MAX_AIR_BUBBLE_VORTEX_PERIOD: f32 = 4.5;

    /// Cumulated intaken water after which a leaking point emits an air bubble.
    pub fn air_bubbles_density_to_cumulated_intaken_water(air_bubbles_density: f32) -> f32 {
        MAX_AIR_BUBBLES_DENSITY - air_bubbles_density
    }
}

/// Interactive tools, explosions and bombs.
pub mod interaction_constants {
    pub const DRAW_FORCE: f32 = 40000.0;
    pub const SWIRL_FORCE: f32 = 600.0;

    pub const BLAST_FORCE_BASE: f32 = 105.0 * 50000.0;
    pub const ULTRA_VIOLENT_BLAST_MULTIPLIER: f32 = 5.0;

    /// Seconds an explosion lasts.
    pub const EXPLOSION_DURATION: f32 = 1.0;
    /// Blast phase covers this fraction of the explosion.
    pub const EXPLOSION_BLAST_FRACTION: f32 = 0.25;
    pub const EXPLOSION_MAX_DISPLACEMENT_DEPTH: f32 = 20.0;

    pub const ANTI_MATTER_PREIMPLOSION_THICKNESS: f32 = 10.0;
    pub const ANTI_MATTER_PREIMPLOSION_STRENGTH: f32 = 130000.0;
    pub const ANTI_MATTER_IMPLOSION_STRENGTH: f32 = 10000.0;
    pub const ANTI_MATTER_EXPLOSION_STRENGTH: f32 = 30000.0;
    pub const ULTRA_VIOLENT_ANTI_MATTER_MULTIPLIER: f32 = 50.0;

    pub const ELECTRIC_SPARK_HEAT: f32 = 10000.0;
    pub const ULTRA_VIOLENT_SPARK_HEAT_MULTIPLIER: f32 = 15.0;

    pub const COMBUSTION_EXPLOSION_BLAST_FORCE: f32 = 40000.0;

    /// Speed range of points detached by the destroy tool.
    pub const DESTROY_DETACH_MIN_VELOCITY: f32 = 0.1;
    pub const DESTROY_DETACH_MAX_VELOCITY: f32 = 3.0;
    /// Speed of the point an explosion rips off at its center.
    pub const EXPLOSION_DETACH_VELOCITY: f32 = 20.0;

    /// A broken spring is only repaired while its endpoints are within this
    /// multiple of its rest length.
    pub const REPAIR_MAX_SPRING_STRETCH: f32 = 1.25;

    /// Multiplier applied to water pumps in ultra-violent mode.
    pub const ULTRA_VIOLENT_PUMP_MULTIPLIER: f32 = 20.0;

    /// Repair grace multiplier snaps back to 1.0 within this distance.
    pub const REPAIR_GRACE_SNAP: f32 = 0.02;
    pub const REPAIR_GRACE_RECOVERY_RATE: f32 = 0.2;
}

/// Water dynamics.
pub mod water_constants {
    /// Water above which a point counts as wet for sinking detection.
    pub const WET_POINT_THRESHOLD: f32 = 0.5;
    /// Extra external height forcing flotsam to eventually take water.
    pub const EXTERNAL_WATER_HEIGHT_BIAS: f32 = 0.1;
    /// Number of frames in the splash running average.
    pub const SPLASH_RUNNING_AVERAGE_WINDOW: usize = 30;
    /// Start sinking above this fraction of wet points.
    pub const SINKING_HIGH_WATERMARK: f32 = 0.3;
    /// Stop sinking below this fraction of wet points.
    pub const SINKING_LOW_WATERMARK: f32 = 0.1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_frequency_steps_are_distinct_and_in_period() {
        let mut all: Vec<u64> = Vec::new();
        all.extend(low_frequency_constants::ROT_POINTS_STEPS);
        all.extend(low_frequency_constants::SPRING_DECAY_AND_TEMPERATURE_STEPS);
        all.extend(low_frequency_constants::COMBUSTION_STEPS);
        all.push(low_frequency_constants::UPDATE_SINKING_STEP);
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
        assert!(all.iter().all(|s| *s < low_frequency_constants::PERIOD));
    }

    #[test]
    fn test_air_bubble_threshold() {
        assert_eq!(
            particle_constants::air_bubbles_density_to_cumulated_intaken_water(64.0),
            64.0
        );
    }
}
