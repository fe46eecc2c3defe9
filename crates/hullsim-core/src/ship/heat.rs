//! Heat conduction along springs, dissipation to air and water, and rot.

use hullsim_logic::constants::heat_constants::{SMOTHERING_WATER_HIGH_WATERMARK, THERMOCLINE_DELTA};
use hullsim_logic::constants::low_frequency_constants::PERIOD;
use hullsim_logic::constants::physics_constants::{
    AIR_CONVECTIVE_HEAT_TRANSFER_COEFFICIENT, WATER_CONVECTIVE_HEAT_TRANSFER_COEFFICIENT,
};
use hullsim_logic::constants::world_constants::{MAX_SEA_DEPTH, SIMULATION_STEP_TIME_DURATION};
use hullsim_logic::math::partition_range;
use hullsim_logic::parameters::{SimulationParameters, StormParameters};
use hullsim_logic::vectors::Vec2f;

use crate::points::Points;
use crate::springs::Springs;
use crate::types::ConnectedSpring;

/// Point buffers read by heat propagation.
pub(crate) struct HeatInputs<'a> {
    pub raw_point_count: usize,
    pub position: &'a [Vec2f],
    pub connected_springs: &'a [Vec<ConnectedSpring>],
    pub heat_capacity_reciprocal: &'a [f32],
    /// Points dissipating into water rather than air.
    pub is_wet: &'a [bool],
}

/// Mark the points that dissipate heat into water: underwater at the last
/// depth update, or soaked enough to smother a flame.
pub(crate) fn fill_wet_mask(points: &Points, mask: &mut Vec<bool>) {
    mask.clear();
    mask.extend(
        points
            .cached_depth
            .iter()
            .zip(points.water.iter())
            .map(|(&depth, &water)| depth > 0.0 || water > SMOTHERING_WATER_HIGH_WATERMARK),
    );
}

/// Conduct heat from hotter to colder points along springs, then let every
/// point (ephemeral included) dissipate towards the ambient temperature.
pub(crate) fn propagate_heat(
    inputs: &HeatInputs<'_>,
    temperature: &mut [f32],
    old_temperature: &mut Vec<f32>,
    springs: &Springs,
    dt: f32,
    storm: &StormParameters,
    params: &SimulationParameters,
) {
    old_temperature.clear();
    old_temperature.extend_from_slice(temperature);

    let hcr = inputs.heat_capacity_reciprocal;
    let mut outbound_flows: Vec<f32> = Vec::new();

    //
    // Conduction
    //

    for p in 0..inputs.raw_point_count {
        let point_temperature = old_temperature[p];
        let connected = &inputs.connected_springs[p];

        outbound_flows.clear();
        let mut total_outgoing = 0.0;
        for cs in connected {
            // q = K * (Tp - To) * dt / L, outgoing only
            let flow = springs.thermal_conductivity[cs.spring]
                * params.thermal_conductivity_adjustment
                * (point_temperature - old_temperature[cs.other_endpoint]).max(0.0)
                * dt
                / springs.factory_rest_length[cs.spring];
            outbound_flows.push(flow);
            total_outgoing += flow;
        }

        // Never give away more heat than the point holds
        let normalization = if total_outgoing > 0.0 {
            ((point_temperature / hcr[p]) / total_outgoing).min(1.0)
        } else {
            0.0
        };

        for (cs, flow) in connected.iter().zip(outbound_flows.iter()) {
            temperature[cs.other_endpoint] += flow * normalization * hcr[cs.other_endpoint];
        }
        temperature[p] -= total_outgoing * normalization * hcr[p];
    }

    //
    // Dissipation
    //

    // Exaggerated, as wet material is harder to re-kindle
    let water_coefficient =
        WATER_CONVECTIVE_HEAT_TRANSFER_COEFFICIENT * dt * params.heat_dissipation_adjustment * 2.0;
    let air_coefficient = AIR_CONVECTIVE_HEAT_TRANSFER_COEFFICIENT * dt * params.heat_dissipation_adjustment
        + storm.rain_density.powf(0.3) * water_coefficient;

    let surface_water_temperature = params.water_temperature;
    let thermocline_slope = -THERMOCLINE_DELTA / MAX_SEA_DEPTH;
    let air_temperature = params.air_temperature;

    for p in 0..temperature.len() {
        let (delta, heat_lost) = if inputs.is_wet[p] {
            let water_temperature = surface_water_temperature
                - (inputs.position[p].y * thermocline_slope).clamp(0.0, surface_water_temperature);
            let delta = temperature[p] - water_temperature;
            (delta, water_coefficient * delta)
        } else {
            let delta = temperature[p] - air_temperature;
            (delta, air_coefficient * delta)
        };

        let dissipation = heat_lost * hcr[p];
        if delta >= 0.0 {
            temperature[p] -= dissipation.min(delta);
        } else {
            temperature[p] -= dissipation.max(delta);
        }
    }
}

/// Decay one partition of the raw points.
///
/// Decay follows `decay(n) = alpha * decay(n-1)` with `alpha = 1 - beta * x`.
/// After twenty minutes a dry underwater point keeps 75% of its decay, a
/// flooded underwater one 25%; `x` grows with submersion, water, leaking
/// and the material's rust receptivity.
pub(crate) fn rot_points(points: &mut Points, partition: usize, partition_count: usize, params: &SimulationParameters) {
    if params.rot_accelerator == 0.0 {
        return;
    }

    let low_frequency_step_duration = PERIOD as f32 * SIMULATION_STEP_TIME_DURATION;
    let steps_in_twenty_minutes = 20.0 * 60.0 / low_frequency_step_duration;

    let a_underwater = 0.75_f32.powf(params.rot_accelerator / steps_in_twenty_minutes);
    let a_flooded = 0.25_f32.powf(params.rot_accelerator / steps_in_twenty_minutes);

    let x_underwater = (1.0 - a_underwater) / (a_underwater - a_flooded);
    let beta = (1.0 - a_underwater) / x_underwater;

    let (start, end) = partition_range(points.raw_ship_point_count(), partition, partition_count);
    for p in start..end {
        let mut x = if points.cached_depth[p] > 0.0 { x_underwater } else { 0.0 } + points.water[p].min(1.0);
        x += points.leaking[p].structural_leak * x * x_underwater;
        x *= points.rust_receptivity[p];

        let alpha = (1.0 - beta * x).max(0.0);
        points.set_decay(p, points.decay[p] * alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShipBuilder;
    use hullsim_logic::materials::MaterialPreset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn steel_bar(length: usize, params: &SimulationParameters) -> (Points, Springs) {
        let mut builder = ShipBuilder::new();
        let steel = builder.add_material(MaterialPreset::Steel.material());
        let mut previous = None;
        for i in 0..length {
            let p = builder.add_point(Vec2f::new(i as f32, 10.0), steel);
            if let Some(q) = previous {
                builder.add_spring(q, p);
            }
            previous = Some(p);
        }
        let mut rng = StdRng::seed_from_u64(11);
        let structure = builder.build_structure(params, &mut rng).expect("valid bar");
        (structure.points, structure.springs)
    }

    fn heat_content(points: &Points) -> f32 {
        points
            .raw_ship_points()
            .map(|p| points.temperature[p] / points.heat_capacity_reciprocal[p])
            .sum()
    }

    fn run_heat(points: &mut Points, springs: &Springs, storm: &StormParameters, params: &SimulationParameters) {
        let mut mask = Vec::new();
        fill_wet_mask(points, &mut mask);
        let mut scratch = Vec::new();
        let Points {
            raw_ship_point_count,
            position,
            connected_springs,
            heat_capacity_reciprocal,
            temperature,
            ..
        } = points;
        propagate_heat(
            &HeatInputs {
                raw_point_count: *raw_ship_point_count,
                position,
                connected_springs,
                heat_capacity_reciprocal,
                is_wet: &mask,
            },
            temperature,
            &mut scratch,
            springs,
            SIMULATION_STEP_TIME_DURATION,
            storm,
            params,
        );
    }

    #[test]
    fn test_conduction_moves_heat_without_creating_it() {
        let params = SimulationParameters {
            heat_dissipation_adjustment: 0.0,
            ..SimulationParameters::default()
        };
        let (mut points, springs) = steel_bar(3, &params);
        points.set_temperature(0, 1000.0);
        let before = heat_content(&points);

        for _ in 0..10 {
            run_heat(&mut points, &springs, &StormParameters::default(), &params);
        }

        assert!(points.temperature(0) < 1000.0);
        assert!(points.temperature(1) > params.air_temperature);
        assert!(points.temperature(1) > points.temperature(2));
        assert!((heat_content(&points) - before).abs() / before < 1e-4);
    }

    #[test]
    fn test_dissipation_never_overshoots_ambient() {
        let params = SimulationParameters {
            heat_dissipation_adjustment: 1000.0,
            ..SimulationParameters::default()
        };
        let (mut points, springs) = steel_bar(2, &params);
        points.set_temperature(0, params.air_temperature + 50.0);
        points.set_temperature(1, params.air_temperature - 50.0);

        run_heat(&mut points, &springs, &StormParameters::default(), &params);

        assert!(points.temperature(0) >= params.air_temperature - 1e-3);
        assert!(points.temperature(1) <= params.air_temperature + 1e-3);
    }

    #[test]
    fn test_underwater_points_rot_faster_than_dry_ones() {
        let params = SimulationParameters {
            rot_accelerator: 1000.0,
            ..SimulationParameters::default()
        };
        let (mut points, _) = steel_bar(3, &params);
        points.cached_depth[0] = -10.0;
        points.cached_depth[1] = 10.0;
        points.cached_depth[2] = 10.0;
        points.water[2] = 1.0;

        for _ in 0..3 {
            rot_points(&mut points, 0, 1, &params);
        }

        assert_eq!(points.decay(0), 1.0);
        assert!(points.decay(1) < 1.0);
        assert!(points.decay(2) < points.decay(1));
        assert!(points.decay(2) > 0.0);
    }

    #[test]
    fn test_rot_disabled_and_partitioned() {
        let mut params = SimulationParameters {
            rot_accelerator: 0.0,
            ..SimulationParameters::default()
        };
        let (mut points, _) = steel_bar(4, &params);
        points.cached_depth.iter_mut().for_each(|d| *d = 10.0);

        rot_points(&mut points, 0, 1, &params);
        assert!(points.raw_ship_points().all(|p| points.decay(p) == 1.0));

        params.rot_accelerator = 1000.0;
        rot_points(&mut points, 0, 2, &params);
        assert!(points.decay(0) < 1.0 && points.decay(1) < 1.0);
        assert_eq!(points.decay(2), 1.0);
        assert_eq!(points.decay(3), 1.0);
    }
}
