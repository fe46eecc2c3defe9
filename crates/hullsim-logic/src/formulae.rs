//! Closed-form physical formulae shared by the ship passes.
//!
//! Densities, column pressures, wind force and the dynamics coefficients
//! that depend only on parameters, never on per-point state.

use crate::constants::dynamics_constants::*;
use crate::constants::physics_constants::*;
use crate::constants::world_constants::*;
use crate::parameters::SimulationParameters;
use crate::vectors::Vec2f;

/// Density of air at the given temperature, in Kg/m3.
pub fn air_density(air_temperature: f32, params: &SimulationParameters) -> f32 {
    AIR_MASS / (1.0 + AIR_THERMAL_EXPANSION_COEFFICIENT * (air_temperature - TEMPERATURE_0))
        * params.air_density_adjustment
}

/// Density of water at the given temperature, in Kg/m3.
pub fn water_density(water_temperature: f32, params: &SimulationParameters) -> f32 {
    WATER_MASS / (1.0 + WATER_THERMAL_EXPANSION_COEFFICIENT * (water_temperature - TEMPERATURE_0))
        * params.water_density_adjustment
}

/// Pressure at the bottom of one cubic meter of water, in the void.
pub fn volumetric_water_pressure(water_temperature: f32, params: &SimulationParameters) -> f32 {
    water_density(water_temperature, params) * GRAVITY_MAGNITUDE
}

/// Pressure of the 1m2 column of air above `y`.
///
/// Linear simplification of the barometric formula: zero at 110% of the
/// half world height, sea-level pressure at `y = 0`.
pub fn air_column_pressure_at(y: f32, air_density: f32) -> f32 {
    let sea_level_pressure = AIR_PRESSURE_AT_SEA_LEVEL * (air_density / AIR_MASS);
    let top = HALF_MAX_WORLD_HEIGHT * 1.1;
    sea_level_pressure * (top - y) / top
}

pub fn water_column_pressure(height: f32, water_density: f32) -> f32 {
    water_density * height * GRAVITY_MAGNITUDE
}

/// Air plus water pressure at `y`, with the ocean surface at `ocean_surface_y`.
pub fn total_pressure_at(y: f32, ocean_surface_y: f32, air_density: f32, water_density: f32) -> f32 {
    air_column_pressure_at(y.max(ocean_surface_y), air_density)
        + water_column_pressure((ocean_surface_y - y).max(0.0), water_density)
}

/// Force a wind blowing at `wind_speed` (m/s) exerts on 1m2: `½ ρ v|v|`.
pub fn wind_speed_to_force_density(wind_speed: Vec2f, air_density: f32) -> Vec2f {
    wind_speed * wind_speed.length() * 0.5 * air_density
}

pub fn kmh_to_ms(v: Vec2f) -> Vec2f {
    v / 3.6
}

/// Velocity factor applied to a sub-iteration displacement.
///
/// The reference damping is defined at 12 iterations; it is re-derived for
/// `num_iterations` so that the total damping per step stays constant, then
/// reshaped by the global damping adjustment (quadratic below and above 1.0).
pub fn global_damping_velocity_factor(num_iterations: f32, global_damping_adjustment: f32) -> f32 {
    let dt = SIMULATION_STEP_TIME_DURATION / num_iterations;
    let global_damping = 1.0 - (1.0 - GLOBAL_DAMPING).powf(12.0 / num_iterations);

    let adj = global_damping_adjustment - 1.0;
    let coefficient = 1.0
        - if global_damping_adjustment <= 1.0 {
            global_damping * (1.0 - adj * adj)
        } else {
            global_damping
                + adj * adj / ((MAX_GLOBAL_DAMPING_ADJUSTMENT - 1.0) * (MAX_GLOBAL_DAMPING_ADJUSTMENT - 1.0))
                    * (1.0 - global_damping)
        };

    coefficient / dt
}

/// Empirical correction of spring strength for the number of relaxation iterations.
pub fn spring_strength_iterations_adjustment(num_iterations: f32) -> f32 {
    0.283_216_3 + 9.209_594 * (-0.114_227_9 * num_iterations).exp()
}

/// Extra elongation tolerance a melting spring of the given strength gains.
///
/// Weak springs may stretch up to 20x their tolerance, strong ones not at all.
pub fn extra_melting_induced_tolerance(strength: f32) -> f32 {
    const MAX_TOLERANCE: f32 = 20.0;
    const MIN_TOLERANCE: f32 = 0.0;
    const START_STRENGTH: f32 = 0.3;
    const END_STRENGTH: f32 = 3.0;

    MAX_TOLERANCE
        - (MAX_TOLERANCE - MIN_TOLERANCE) / (END_STRENGTH - START_STRENGTH)
            * (strength.clamp(START_STRENGTH, END_STRENGTH) - START_STRENGTH)
}

/// Buoyancy push is `coefficient1 + coefficient2 * temperature`, per unit density.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BuoyancyCoefficients {
    pub coefficient1: f32,
    pub coefficient2: f32,
}

pub fn buoyancy_coefficients(buoyancy_volume_fill: f32, thermal_expansion_coefficient: f32) -> BuoyancyCoefficients {
    BuoyancyCoefficients {
        coefficient1: GRAVITY_MAGNITUDE
            * buoyancy_volume_fill
            * (1.0 - thermal_expansion_coefficient * TEMPERATURE_0),
        coefficient2: GRAVITY_MAGNITUDE * buoyancy_volume_fill * thermal_expansion_coefficient,
    }
}

/// Quadratic fit `alpha(mass) = a m² + b m + c` of the per-low-frequency-step
/// decay multiplier of a burning particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombustionDecayCoefficients {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl CombustionDecayCoefficients {
    pub fn alpha(&self, mass: f32) -> f32 {
        self.a * mass * mass + self.b * mass + self.c
    }
}

/// Fits the decay multiplier through three reference particles whose decay
/// halves in the given number of seconds, scaled by the combustion speed.
pub fn combustion_decay_coefficients(
    combustion_speed_adjustment: f32,
    low_frequency_step_duration: f32,
) -> CombustionDecayCoefficients {
    // (mass, seconds to half-decay)
    const REFERENCES: [(f32, f32); 3] = [(0.6, 12.0), (800.0, 26.5284), (2400.0, 2653.19)];

    let alpha_for = |seconds: f32| {
        let n = seconds / (combustion_speed_adjustment * low_frequency_step_duration);
        0.5_f32.powf(1.0 / n)
    };

    let (m1, m2, m3) = (REFERENCES[0].0, REFERENCES[1].0, REFERENCES[2].0);
    let (a1, a2, a3) = (alpha_for(REFERENCES[0].1), alpha_for(REFERENCES[1].1), alpha_for(REFERENCES[2].1));

    let den = (m1 - m2) * (m1 - m3) * (m2 - m3);
    let a = (m3 * (a2 - a1) + m2 * (a1 - a3) + m1 * (a3 - a2)) / den;
    let b = (m1 * m1 * (a2 - a3) + m3 * m3 * (a1 - a2) + m2 * m2 * (a3 - a1)) / den;
    let c = (m2 * m2 * (m3 * a1 - m1 * a3) + m2 * (m1 * m1 * a3 - m3 * m3 * a1) + m1 * m3 * (m3 - m1) * a2) / den;

    CombustionDecayCoefficients { a, b, c }
}

/// Factors applied to a point's velocity when it bounces off the sea floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OceanFloorCollisionFactors {
    /// Negative: reverses the normal component.
    pub elasticity_factor: f32,
    pub static_friction_factor: f32,
    pub kinetic_friction_factor: f32,
}

/// The ocean floor and the material each contribute half of the elasticity
/// and friction.
pub fn ocean_floor_collision_factors(
    material_elasticity: f32,
    material_static_friction: f32,
    material_kinetic_friction: f32,
    params: &SimulationParameters,
) -> OceanFloorCollisionFactors {
    let floor_elasticity = params.ocean_floor_elasticity_coefficient;
    let floor_friction = params.ocean_floor_friction_coefficient;

    OceanFloorCollisionFactors {
        elasticity_factor: (-(material_elasticity + floor_elasticity) / 2.0 * params.elasticity_adjustment)
            .clamp(-1.0, 0.0),
        static_friction_factor: (1.0
            - (material_static_friction + floor_friction) / 2.0 * params.static_friction_adjustment)
            .clamp(0.0, 1.0),
        kinetic_friction_factor: (1.0
            - (material_kinetic_friction + floor_friction) / 2.0 * params.kinetic_friction_adjustment)
            .clamp(0.0, 1.0),
    }
}

/// Maximum depth at which a frontier point still displaces the ocean surface.
///
/// Quadratic in vertical velocity up to 35 m/s, deeper when sinking than rising.
pub fn water_displacement_max_depth(vertical_velocity: f32) -> f32 {
    const VEL_MAX: f32 = 35.0;
    const A: f32 = -0.5 / (VEL_MAX * VEL_MAX);
    const B: f32 = 1.0 / VEL_MAX;

    let c = vertical_velocity.abs().min(VEL_MAX);
    let depth_multiplier = if vertical_velocity <= 0.0 { 12.0 } else { 4.0 };
    (A * c * c + B * c + 0.5) * depth_multiplier
}

/// Unsigned ocean surface displacement for a point moving vertically at
/// `abs_vertical_velocity`: quadratic below the knee, linear above it.
pub fn water_displacement_magnitude(abs_vertical_velocity: f32, wave_height_adjustment: f32) -> f32 {
    // Knee of the curve
    const X0: f32 = 2.0;
    const Y0: f32 = 0.16;

    let slope = SIMULATION_STEP_TIME_DURATION * 6.0 * wave_height_adjustment;

    // y = ax² + bx with y(0) = 0, y(x0) = y0, y'(x0) = slope
    let quadratic_a = (slope * X0 - Y0) / (X0 * X0);
    let quadratic_b = 2.0 * Y0 / X0 - slope;

    let v = abs_vertical_velocity.min(10000.0);
    if v < X0 {
        quadratic_a * v * v + quadratic_b * v
    } else {
        Y0 + slope * (v - X0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_densities_at_reference_temperature() {
        let params = SimulationParameters::default();
        assert!((air_density(TEMPERATURE_0, &params) - AIR_MASS).abs() < 1e-6);
        assert!((water_density(TEMPERATURE_0, &params) - WATER_MASS).abs() < 1e-3);
        // Warmer air is lighter
        assert!(air_density(TEMPERATURE_0 + 30.0, &params) < AIR_MASS);
    }

    #[test]
    fn test_total_pressure_grows_with_depth() {
        let p_surface = total_pressure_at(0.0, 0.0, AIR_MASS, WATER_MASS);
        let p_deep = total_pressure_at(-10.0, 0.0, AIR_MASS, WATER_MASS);
        assert!((p_surface - AIR_PRESSURE_AT_SEA_LEVEL).abs() < 1.0);
        assert!((p_deep - p_surface - 10.0 * WATER_MASS * GRAVITY_MAGNITUDE).abs() < 1.0);
    }

    #[test]
    fn test_damping_factor_independent_of_iterations_at_reference() {
        // With adjustment 1.0 the retained velocity after a whole step is
        // the same regardless of the iteration count.
        for n in [12.0_f32, 24.0, 40.0] {
            let dt = SIMULATION_STEP_TIME_DURATION / n;
            let per_iteration = global_damping_velocity_factor(n, 1.0) * dt;
            let per_step = per_iteration.powf(n);
            let reference = (1.0 - GLOBAL_DAMPING).powf(12.0);
            assert!((per_step - reference).abs() < 1e-4, "n={n}");
        }
    }

    #[test]
    fn test_damping_adjustment_zero_means_no_damping() {
        let n = 40.0;
        let dt = SIMULATION_STEP_TIME_DURATION / n;
        let factor = global_damping_velocity_factor(n, 0.0) * dt;
        assert!((factor - 1.0).abs() < 1e-6);
        // Maximum adjustment kills all velocity
        let factor = global_damping_velocity_factor(n, MAX_GLOBAL_DAMPING_ADJUSTMENT) * dt;
        assert!(factor.abs() < 1e-6);
    }

    #[test]
    fn test_combustion_decay_hits_references() {
        let dt = 49.0 / 64.0;
        let coeffs = combustion_decay_coefficients(1.0, dt);
        let n = 12.0 / dt;
        let expected = 0.5_f32.powf(1.0 / n);
        assert!((coeffs.alpha(0.6) - expected).abs() < 1e-3);
        let alpha = coeffs.alpha(800.0);
        assert!(alpha > 0.0 && alpha < 1.0);
    }

    #[test]
    fn test_water_displacement_is_continuous_at_knee() {
        let below = water_displacement_magnitude(1.9999, 1.0);
        let above = water_displacement_magnitude(2.0, 1.0);
        assert!((below - above).abs() < 1e-3);
        assert_eq!(water_displacement_magnitude(0.0, 1.0), 0.0);
        assert!(water_displacement_max_depth(-35.0) > water_displacement_max_depth(35.0));
    }

    #[test]
    fn test_wind_force_keeps_direction() {
        let f = wind_speed_to_force_density(Vec2f::new(-10.0, 0.0), 1.0);
        assert!(f.x < 0.0);
        assert!((f.x + 50.0).abs() < 1e-4);
    }
}
