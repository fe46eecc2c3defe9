//! Water dynamics: intake through leaks and pumps, internal pressure,
//! momentum-based flow between points, splashes and sinking.

use rand::Rng;

use hullsim_logic::constants::interaction_constants::ULTRA_VIOLENT_PUMP_MULTIPLIER;
use hullsim_logic::constants::particle_constants::air_bubbles_density_to_cumulated_intaken_water;
use hullsim_logic::constants::physics_constants::GRAVITY_MAGNITUDE;
use hullsim_logic::constants::water_constants::*;
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::formulae::{total_pressure_at, volumetric_water_pressure};
use hullsim_logic::parameters::{SimulationParameters, StormParameters};
use hullsim_logic::vectors::Vec2f;

use crate::points::Points;
use crate::springs::Springs;
use crate::types::ConnectedSpring;

/// Move water in and out of every leaking raw point, updating internal
/// pressure and spawning air bubbles. Returns the water taken in this
/// step, ropes excluded.
pub(crate) fn update_pressure_and_water_inflow(
    points: &mut Points,
    air_density: f32,
    water_density: f32,
    current_time: f32,
    storm: &StormParameters,
    params: &SimulationParameters,
    rng: &mut impl Rng,
) -> f32 {
    let volumetric_pressure = volumetric_water_pressure(params.water_temperature, params);

    // Equivalent depth of a point exposed to rain
    let rain_height =
        storm.rain_quantity / 3600.0 * SIMULATION_STEP_TIME_DURATION * params.rain_flood_adjustment;

    let pump_multiplier = params.water_pump_power_adjustment
        * if params.is_ultra_violent_mode {
            ULTRA_VIOLENT_PUMP_MULTIPLIER
        } else {
            1.0
        };

    let do_generate_air_bubbles = params.do_generate_air_bubbles && params.air_bubbles_density != 0.0;
    let air_bubbles_threshold = air_bubbles_density_to_cumulated_intaken_water(params.air_bubbles_density);

    let mut water_taken = 0.0;

    for p in points.raw_ship_points() {
        let leaking = points.leaking[p];
        if !leaking.is_cumulatively_leaking() {
            continue;
        }
        // Hull points only ever pump
        debug_assert!(!points.is_hull[p] || leaking.structural_leak == 0.0);

        let depth = points.cached_depth[p];
        let position = points.position[p];

        // Forces flotsam to eventually take water
        let external_height = (depth + EXTERNAL_WATER_HEIGHT_BIAS).max(rain_height);
        let internal_height = points.water[p];

        let mut total_delta = 0.0;

        if leaking.structural_leak != 0.0 {
            // Bernoulli
            let velocity = if external_height >= internal_height {
                (2.0 * GRAVITY_MAGNITUDE * (external_height - internal_height)).sqrt()
            } else {
                -(2.0 * GRAVITY_MAGNITUDE * (internal_height - external_height)).sqrt()
            };

            let mut delta = velocity
                * SIMULATION_STEP_TIME_DURATION
                * points.water_intake[p]
                * params.water_intake_adjustment;
            if delta < 0.0 {
                delta = delta.max(-points.water[p]) * points.water_restitution[p];
            }
            points.water[p] += delta;
            total_delta += delta;

            points.internal_pressure[p] = total_pressure_at(position.y, position.y + depth, air_density, water_density);
        }

        let pump_force = leaking.water_pump_force;
        if pump_force != 0.0 {
            // Inward pumps need the sea, outward pumps need water inside
            let works = if pump_force > 0.0 {
                external_height > 0.0
            } else {
                internal_height > 0.0
            };
            let mut delta = if works { pump_force * pump_multiplier } else { 0.0 };
            delta = delta.max(-points.water[p]);
            points.water[p] += delta;
            total_delta += delta;

            points.internal_pressure[p] = (points.internal_pressure[p] + delta * volumetric_pressure).max(0.0);
        }

        points.cumulated_intaken_water[p] += total_delta;
        if points.cumulated_intaken_water[p] > air_bubbles_threshold {
            if do_generate_air_bubbles && !points.is_rope[p] {
                let temperature = points.temperature[p];
                let plane_id = points.plane_id[p];
                points.create_ephemeral_air_bubble(position, depth, temperature, current_time, plane_id, rng, params);
            }
            points.cumulated_intaken_water[p] = 0.0;
        }

        if !points.is_rope[p] {
            water_taken += total_delta;
        }
    }

    water_taken
}

/// Spread internal pressure: non-hull points share their surplus with
/// lower-pressure non-hull neighbors; hull points take the average of
/// their non-hull neighbors.
pub(crate) fn equalize_internal_pressure(
    raw_point_count: usize,
    internal_pressure: &mut [f32],
    is_hull: &[bool],
    connected_springs: &[Vec<ConnectedSpring>],
) {
    let mut targets: Vec<usize> = Vec::new();

    for p in 0..raw_point_count {
        if !is_hull[p] {
            let pressure = internal_pressure[p];
            let mut sum = pressure;
            targets.clear();
            for cs in &connected_springs[p] {
                let other = cs.other_endpoint;
                if pressure > internal_pressure[other] && !is_hull[other] {
                    sum += internal_pressure[other];
                    targets.push(other);
                }
            }
            let average = sum / (targets.len() + 1) as f32;
            internal_pressure[p] = average;
            for &other in &targets {
                internal_pressure[other] = average;
            }
        } else {
            let mut sum = 0.0;
            let mut count = 0usize;
            for cs in &connected_springs[p] {
                if !is_hull[cs.other_endpoint] {
                    sum += internal_pressure[cs.other_endpoint];
                    count += 1;
                }
            }
            if count != 0 {
                internal_pressure[p] = sum / count as f32;
            }
        }
    }
}

/// Point buffers read by the water flow pass.
pub(crate) struct WaterFlowInputs<'a> {
    pub raw_point_count: usize,
    pub position: &'a [Vec2f],
    pub connected_springs: &'a [Vec<ConnectedSpring>],
    pub water_diffusion_speed: &'a [f32],
}

/// Point buffers written by the water flow pass.
pub(crate) struct WaterFlowState<'a> {
    pub water: &'a mut [f32],
    pub water_velocity: &'a mut [Vec2f],
    pub water_momentum: &'a mut [Vec2f],
}

/// Move water and its momentum along springs. Flow through impermeable
/// springs bounces back. Returns the kinetic energy lost near dry points,
/// which drives splashes.
pub(crate) fn update_water_velocities(
    inputs: &WaterFlowInputs<'_>,
    state: &mut WaterFlowState<'_>,
    springs: &Springs,
    old_water: &mut Vec<f32>,
    params: &SimulationParameters,
) -> f32 {
    let raw = inputs.raw_point_count;

    for p in 0..state.water.len() {
        state.water_momentum[p] = state.water_velocity[p] * state.water[p];
    }

    old_water.clear();
    old_water.extend_from_slice(state.water);

    // 1.0 for a dry point, 0.0 for a drowned one
    let freeness: Vec<f32> = old_water[..raw].iter().map(|w| (-w * 10.0).exp()).collect();

    let mut weights: Vec<f32> = Vec::new();
    let mut velocities: Vec<Vec2f> = Vec::new();
    let mut splash = 0.0;

    for p in 0..raw {
        let old_velocity = state.water_velocity[p];
        let alpha = 1.0 + params.water_crazyness * (old_water[p] - 1.0);

        weights.clear();
        velocities.clear();
        let mut total_weight = 0.0;
        let mut splash_neighbors = 0.0;
        let mut splash_free_neighbors = 0.0;

        for cs in &inputs.connected_springs[p] {
            let other = cs.other_endpoint;
            let direction = (inputs.position[other] - inputs.position[p]).normalise();

            let own_velocity = old_velocity.dot(direction);

            // Positive drives water from p towards other
            let dwy = (old_water[p] - old_water[other]) + (inputs.position[p].y - inputs.position[other].y);
            let bernoulli = if dwy >= 0.0 {
                (2.0 * GRAVITY_MAGNITUDE * dwy).sqrt()
            } else {
                -(2.0 * GRAVITY_MAGNITUDE * -dwy).sqrt()
            };

            let outbound = (own_velocity + bernoulli * alpha).max(0.0);
            let weight = outbound / springs.factory_rest_length[cs.spring];
            weights.push(weight);
            velocities.push(direction * outbound);
            total_weight += weight;

            let permeability = springs.water_permeability[cs.spring];
            splash_free_neighbors += permeability * freeness[other];
            splash_neighbors += permeability;
        }

        let normalization = if total_weight != 0.0 {
            old_water[p] * inputs.water_diffusion_speed[p] * params.water_diffusion_speed_adjustment / total_weight
        } else {
            0.0
        };

        let mut kinetic_energy_loss = 0.0;
        for (i, cs) in inputs.connected_springs[p].iter().enumerate() {
            let other = cs.other_endpoint;
            let quantity = weights[i] * normalization;
            let outbound_velocity = velocities[i];

            if springs.water_permeability[cs.spring] != 0.0 {
                state.water[p] -= quantity;
                state.water[other] += quantity;
                state.water_momentum[p] -= old_velocity * quantity;
                state.water_momentum[other] += outbound_velocity * quantity;

                // Splintered water colliding with the water at the other end
                let direction = outbound_velocity.normalise();
                let ma = quantity;
                let va = outbound_velocity.length();
                let mb = old_water[other];
                let vb = state.water_velocity[other].dot(direction);
                let vf = if ma + mb != 0.0 { (ma * va + mb * vb) / (ma + mb) } else { 0.0 };
                kinetic_energy_loss += (0.5 * ma * (va * va - vf * vf)).max(0.0);
            } else {
                // Wall hit: inelastic bounce
                state.water_momentum[p] -= outbound_velocity * quantity;
                let va = outbound_velocity.length();
                kinetic_energy_loss += 0.5 * quantity * va * va;
            }
        }

        if splash_neighbors != 0.0 {
            splash += kinetic_energy_loss * splash_free_neighbors / splash_neighbors;
        }
    }

    for p in 0..state.water.len() {
        state.water_velocity[p] = if state.water[p] != 0.0 {
            state.water_momentum[p] / state.water[p]
        } else {
            Vec2f::ZERO
        };
    }

    splash
}

/// Fixed-window running average, zero-initialized.
#[derive(Debug, Clone)]
pub(crate) struct RunningAverage {
    samples: Vec<f32>,
    next: usize,
    sum: f32,
}

impl RunningAverage {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            samples: vec![0.0; window.max(1)],
            next: 0,
            sum: 0.0,
        }
    }

    pub(crate) fn update(&mut self, sample: f32) -> f32 {
        self.sum += sample - self.samples[self.next];
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % self.samples.len();
        self.sum / self.samples.len() as f32
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self::new(SPLASH_RUNNING_AVERAGE_WINDOW)
    }
}

/// Number of raw points holding enough water to count as wet.
pub(crate) fn wet_point_count(points: &Points) -> usize {
    points
        .raw_ship_points()
        .filter(|&p| points.water[p] >= WET_POINT_THRESHOLD)
        .count()
}

/// New sinking state when a watermark is crossed, `None` otherwise. Points
/// wet since construction do not count.
pub(crate) fn sinking_transition(is_sinking: bool, wet_points: usize, raw_points: usize, factory_wet: usize) -> Option<bool> {
    let high = (raw_points as f32 * SINKING_HIGH_WATERMARK) as usize + factory_wet;
    let low = (raw_points as f32 * SINKING_LOW_WATERMARK) as usize + factory_wet;
    if !is_sinking && wet_points > high {
        Some(true)
    } else if is_sinking && wet_points < low {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShipBuilder;
    use hullsim_logic::materials::MaterialPreset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_running_average_window() {
        let mut avg = RunningAverage::new(4);
        assert_eq!(avg.update(4.0), 1.0);
        assert_eq!(avg.update(4.0), 2.0);
        avg.update(4.0);
        assert_eq!(avg.update(4.0), 4.0);
        // Oldest sample drops out
        assert_eq!(avg.update(0.0), 3.0);
    }

    #[test]
    fn test_sinking_watermarks_have_hysteresis() {
        assert_eq!(sinking_transition(false, 31, 100, 0), Some(true));
        assert_eq!(sinking_transition(false, 30, 100, 0), None);
        assert_eq!(sinking_transition(true, 20, 100, 0), None);
        assert_eq!(sinking_transition(true, 9, 100, 0), Some(false));
        // Factory wet points raise both marks
        assert_eq!(sinking_transition(false, 31, 100, 5), None);
    }

    #[test]
    fn test_non_hull_pressure_flows_to_lower_neighbors_only() {
        let cs = |spring, other_endpoint| ConnectedSpring { spring, other_endpoint };
        let connected = vec![
            vec![cs(0, 1), cs(1, 2)],
            vec![cs(0, 0)],
            vec![cs(1, 0)],
        ];
        let mut pressure = vec![9.0, 3.0, 12.0];
        equalize_internal_pressure(3, &mut pressure, &[false, false, false], &connected);
        // Point 0 first averages with point 1 only, then point 2 flows into point 0
        assert_eq!(pressure[1], 6.0);
        assert_eq!(pressure[0], 9.0);
        assert_eq!(pressure[2], 9.0);
    }

    #[test]
    fn test_hull_point_takes_average_of_non_hull_neighbors() {
        let cs = |spring, other_endpoint| ConnectedSpring { spring, other_endpoint };
        let connected = vec![vec![cs(0, 1), cs(1, 2)], vec![cs(0, 0)], vec![cs(1, 0)]];
        let mut pressure = vec![100.0, 4.0, 8.0];
        equalize_internal_pressure(1, &mut pressure, &[true, false, false], &connected);
        assert_eq!(pressure[0], 6.0);
    }

    #[test]
    fn test_pump_force_raises_water_and_pressure() {
        let params = SimulationParameters::default();
        let mut builder = ShipBuilder::new();
        let wood = builder.add_material(MaterialPreset::Wood.material());
        let p = builder.add_point(Vec2f::new(0.0, -2.0), wood);

        let mut rng = StdRng::seed_from_u64(5);
        let mut structure = builder.build_structure(&params, &mut rng).expect("valid ship");
        let points = &mut structure.points;
        points.cached_depth[p] = 2.0;
        points.internal_pressure[p] = 1000.0;
        points.set_water_pump_force(p, 0.25);

        let taken = update_pressure_and_water_inflow(
            points,
            1.0,
            1000.0,
            0.0,
            &StormParameters::default(),
            &params,
            &mut rng,
        );

        let expected_water = 0.25 * params.water_pump_power_adjustment;
        assert!((points.water(p) - expected_water).abs() < 1e-6);
        assert!((taken - expected_water).abs() < 1e-6);
        let expected_pressure = 1000.0 + expected_water * volumetric_water_pressure(params.water_temperature, &params);
        assert!((points.internal_pressure(p) - expected_pressure).abs() < 1e-2);
    }

    #[test]
    fn test_water_flows_down_and_is_conserved() {
        let params = SimulationParameters::default();
        let mut builder = ShipBuilder::new();
        let wood = builder.add_material(MaterialPreset::Wood.material());
        let top = builder.add_point(Vec2f::new(0.0, 1.0), wood);
        let bottom = builder.add_point(Vec2f::new(0.0, 0.0), wood);
        builder.add_spring(top, bottom);
        builder.set_point_water(top, 1.0);

        let mut rng = StdRng::seed_from_u64(11);
        let mut structure = builder.build_structure(&params, &mut rng).expect("valid ship");
        let points = &mut structure.points;
        let before: f32 = points.water.iter().sum();

        let Points {
            water,
            water_velocity,
            water_momentum,
            position,
            connected_springs,
            water_diffusion_speed,
            raw_ship_point_count,
            ..
        } = points;
        let mut old_water = Vec::new();
        for _ in 0..5 {
            update_water_velocities(
                &WaterFlowInputs {
                    raw_point_count: *raw_ship_point_count,
                    position,
                    connected_springs,
                    water_diffusion_speed,
                },
                &mut WaterFlowState {
                    water,
                    water_velocity,
                    water_momentum,
                },
                &structure.springs,
                &mut old_water,
                &params,
            );
        }

        let after: f32 = water.iter().sum();
        assert!((before - after).abs() < 1e-4);
        assert!(water[bottom] > 0.0);
        assert!(water.iter().all(|w| *w >= 0.0));
    }
}
