//! Integration tests for the parameter → formula chain.
//!
//! Exercises: SimulationParameters (JSON) → densities → pressures
//! → damping/strength factors → material-derived quantities

use hullsim_logic::constants::physics_constants::*;
use hullsim_logic::constants::world_constants::*;
use hullsim_logic::formulae::*;
use hullsim_logic::materials::MaterialPreset;
use hullsim_logic::parameters::SimulationParameters;

// ── Helpers ────────────────────────────────────────────────────────────

fn params_from(json: &str) -> SimulationParameters {
    SimulationParameters::from_json_str(json).expect("valid parameters")
}

// ── Tests ──────────────────────────────────────────────────────────────

#[test]
fn water_density_adjustment_scales_pressure_linearly() {
    let normal = SimulationParameters::default();
    let dense = params_from(r#"{ "water_density_adjustment": 2.0 }"#);

    let p1 = volumetric_water_pressure(normal.water_temperature, &normal);
    let p2 = volumetric_water_pressure(dense.water_temperature, &dense);
    assert!((p2 / p1 - 2.0).abs() < 1e-4);
}

#[test]
fn air_pressure_vanishes_above_the_atmosphere() {
    let top = HALF_MAX_WORLD_HEIGHT * 1.1;
    assert!(air_column_pressure_at(top, AIR_MASS).abs() < 1e-3);
    assert!(air_column_pressure_at(0.0, AIR_MASS) > air_column_pressure_at(1000.0, AIR_MASS));
}

#[test]
fn more_iterations_mean_weaker_springs() {
    let few = spring_strength_iterations_adjustment(10.0);
    let many = spring_strength_iterations_adjustment(40.0);
    assert!(few > many);
    assert!(many > 0.28);
}

#[test]
fn hull_material_floats_only_by_buoyancy_fill() {
    let hull = MaterialPreset::IronHull.material();
    let coefficients = buoyancy_coefficients(hull.buoyancy_volume_fill, hull.thermal_expansion_coefficient);
    assert_eq!(coefficients.coefficient1, 0.0);
    assert_eq!(coefficients.coefficient2, 0.0);

    let wood = MaterialPreset::Wood.material();
    let coefficients = buoyancy_coefficients(wood.buoyancy_volume_fill, wood.thermal_expansion_coefficient);
    let push_at_t0 = coefficients.coefficient1 + coefficients.coefficient2 * TEMPERATURE_0;
    assert!((push_at_t0 - GRAVITY_MAGNITUDE).abs() < 1e-4);
}

#[test]
fn floor_collision_factors_respect_bounds() {
    let params = params_from(r#"{ "elasticity_adjustment": 4.0, "static_friction_adjustment": 40.0 }"#);
    let steel = MaterialPreset::Steel.material();
    let factors = ocean_floor_collision_factors(
        steel.elasticity_coefficient,
        steel.static_friction_coefficient,
        steel.kinetic_friction_coefficient,
        &params,
    );
    assert!(factors.elasticity_factor >= -1.0 && factors.elasticity_factor <= 0.0);
    assert_eq!(factors.static_friction_factor, 0.0);
    assert!(factors.kinetic_friction_factor >= 0.0 && factors.kinetic_friction_factor <= 1.0);
}

#[test]
fn faster_combustion_decays_faster() {
    let slow = combustion_decay_coefficients(1.0, 49.0 / 64.0);
    let fast = combustion_decay_coefficients(4.0, 49.0 / 64.0);
    assert!(fast.alpha(100.0) < slow.alpha(100.0));
}
