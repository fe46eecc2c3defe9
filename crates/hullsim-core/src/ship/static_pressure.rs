//! Hydrostatic pressure on the external hull.
//!
//! Each external frontier gets a pressure force per hull point, computed at
//! the depth of the frontier center so it does not add buoyancy, and then
//! equalized until it is (nearly) zero-sum and zero-torque. The resulting
//! forces are stored and added to the dynamic forces of the next relaxation.

use hullsim_logic::constants::world_constants::HALF_MAX_WORLD_HEIGHT;
use hullsim_logic::formulae::total_pressure_at;
use hullsim_logic::math::{smooth_step, step};
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::frontiers::{Frontier, Frontiers};
use crate::types::{ElementIndex, FrontierType};
use crate::world::ShipWorld;

/// Net force and torque below which equalization stops.
const EQUALIZATION_TARGET: f32 = 0.5;
/// Candidates within this radius of the best are compared on the other measure.
const QUANTIZATION_RADIUS: f32 = 0.1;

/// Averages over the external frontiers, reported to the event handler.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticPressureStats {
    pub net_force_magnitude_average: f32,
    pub iterations_percentage_average: f32,
}

#[derive(Debug, Clone, Copy)]
struct PressurePoint {
    point: ElementIndex,
    force: Vec2f,
    torque_arm: Vec2f,
}

/// Point buffers read by the pressure pass.
pub(crate) struct PressureInputs<'a> {
    pub position: &'a [Vec2f],
    pub is_hull: &'a [bool],
    pub internal_pressure: &'a [f32],
}

/// Recompute `static_pressure_force` for every point.
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_static_pressure(
    frontiers: &Frontiers,
    inputs: &PressureInputs<'_>,
    static_pressure_force: &mut [Vec2f],
    world: &dyn ShipWorld,
    air_density: f32,
    water_density: f32,
    repair_grace_multiplier: f32,
    params: &SimulationParameters,
) -> StaticPressureStats {
    static_pressure_force.iter_mut().for_each(|f| *f = Vec2f::ZERO);

    let mut buffer: Vec<PressurePoint> = Vec::new();
    let mut net_force_sum = 0.0;
    let mut iterations_sum = 0.0;
    let mut frontier_count = 0usize;

    for (_, frontier) in frontiers.iter() {
        if frontier.frontier_type != FrontierType::External {
            continue;
        }

        let ocean_surface_y = world.height_at(frontier.center.x);
        let total_pressure = total_pressure_at(frontier.center.y, ocean_surface_y, air_density, water_density);

        let (net_force, iterations) = compute_frontier_forces(
            frontiers,
            frontier,
            inputs,
            ocean_surface_y,
            total_pressure,
            params,
            &mut buffer,
        );
        net_force_sum += net_force;
        iterations_sum += iterations as f32 / frontier.size as f32;
        frontier_count += 1;

        let multiplier = total_pressure * params.static_pressure_force_adjustment * repair_grace_multiplier;
        for pp in &buffer {
            static_pressure_force[pp.point] += pp.force * multiplier;
        }
    }

    if frontier_count == 0 {
        return StaticPressureStats::default();
    }
    StaticPressureStats {
        net_force_magnitude_average: net_force_sum / frontier_count as f32,
        iterations_percentage_average: iterations_sum / frontier_count as f32,
    }
}

/// Fill `buffer` with the equalized pressure forces of one frontier;
/// returns the residual net force magnitude and the iterations used.
fn compute_frontier_forces(
    frontiers: &Frontiers,
    frontier: &Frontier,
    inputs: &PressureInputs<'_>,
    ocean_surface_y: f32,
    total_pressure: f32,
    params: &SimulationParameters,
    buffer: &mut Vec<PressurePoint>,
) -> (f32, usize) {
    buffer.clear();

    let center = frontier.center;
    let depth = ocean_surface_y - center.y;

    // 0.0 never counterbalances, 1.0 always does
    let counterbalance_factor = 1.0 / total_pressure
        * (1.0
            - smooth_step(
                HALF_MAX_WORLD_HEIGHT,
                HALF_MAX_WORLD_HEIGHT * 2.0,
                depth + (1.0 - params.hydrostatic_pressure_counterbalance_adjustment) * HALF_MAX_WORLD_HEIGHT * 2.0,
            ) * step(0.0, depth));

    let position = inputs.position;
    let hull = |p: ElementIndex| if inputs.is_hull[p] { 1 } else { 0 };

    //
    // Geometry: -perp of each edge carries the edge length
    //

    let mut net_force = Vec2f::ZERO;
    let mut net_torque = 0.0;

    let edge1 = frontiers.edge(frontier.start_edge);
    let mut prev_point = edge1.point_a;
    let edge2 = frontiers.edge(edge1.next);
    let mut this_point = edge2.point_a;

    let mut edge1_perp = -(position[this_point] - position[prev_point]).to_perpendicular();
    let mut hull_count = hull(prev_point) + hull(this_point);

    let start_edge = edge2.next;
    let mut next_edge = start_edge;
    loop {
        let edge = frontiers.edge(next_edge);
        let next_point = edge.point_a;

        let edge2_perp = -(position[next_point] - position[this_point]).to_perpendicular();

        // Lone hull points get no pressure
        hull_count += hull(next_point);
        if hull_count == 3 {
            let counterbalance = 1.0 - inputs.internal_pressure[this_point] * counterbalance_factor;
            let force = (edge1_perp + edge2_perp) / 2.0 * counterbalance;
            let torque_arm = position[this_point] - center;
            buffer.push(PressurePoint {
                point: this_point,
                force,
                torque_arm,
            });
            net_force += force;
            net_torque += torque_arm.cross(force);
        }

        next_edge = edge.next;
        if next_edge == start_edge {
            break;
        }

        hull_count -= hull(prev_point);
        prev_point = this_point;
        this_point = next_point;
        edge1_perp = edge2_perp;
    }

    //
    // Equalization: repeatedly scale down the force that best reduces the
    // dominant residual
    //

    let mut iter = 0;
    while iter < frontier.size {
        if net_force.length() < EQUALIZATION_TARGET && net_torque.abs() < EQUALIZATION_TARGET {
            break;
        }

        let mut best: Option<(usize, f32)> = None;
        let mut min_force = f32::MAX;
        let mut min_torque = f32::MAX;

        if net_force.length() >= net_torque.abs() {
            for (i, pp) in buffer.iter().enumerate() {
                let force = pp.force;
                if force == Vec2f::ZERO {
                    continue;
                }
                let lambda_raw = -(net_force - force).dot(force) / force.square_length();
                if lambda_raw >= 1.0 {
                    continue;
                }
                let lambda = lambda_raw.max(0.0);
                let torque = pp.torque_arm.cross(force);
                let new_force = (net_force - force * (1.0 - lambda)).length();
                let new_torque = (net_torque - torque * (1.0 - lambda)).abs();
                if new_force < min_force - QUANTIZATION_RADIUS
                    || (new_force < min_force + QUANTIZATION_RADIUS && new_torque < min_torque)
                {
                    min_force = new_force;
                    min_torque = new_torque;
                    best = Some((i, lambda));
                }
            }
        } else {
            for (i, pp) in buffer.iter().enumerate() {
                let force = pp.force;
                let torque = pp.torque_arm.cross(force);
                if torque == 0.0 {
                    continue;
                }
                let lambda_raw = -(net_torque - torque) / torque;
                if lambda_raw >= 1.0 {
                    continue;
                }
                let lambda = lambda_raw.max(0.0);
                let new_force = (net_force - force * (1.0 - lambda)).length();
                let new_torque = (net_torque - torque * (1.0 - lambda)).abs();
                if new_torque < min_torque - QUANTIZATION_RADIUS
                    || (new_torque < min_torque + QUANTIZATION_RADIUS && new_force < min_force)
                {
                    min_force = new_force;
                    min_torque = new_torque;
                    best = Some((i, lambda));
                }
            }
        }

        let Some((i, lambda)) = best else {
            break;
        };

        let force = buffer[i].force;
        let torque = buffer[i].torque_arm.cross(force);
        buffer[i].force = force * lambda;
        net_force -= force * (1.0 - lambda);
        net_torque -= torque * (1.0 - lambda);

        iter += 1;
    }

    (net_force.length(), iter + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShipBuilder;
    use crate::world::CalmSea;
    use hullsim_logic::materials::MaterialPreset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_submerged_hull_box_is_squeezed_without_net_force() {
        let params = SimulationParameters::default();
        let mut builder = ShipBuilder::new();
        let hull = builder.add_material(MaterialPreset::IronHull.material());
        builder.add_grid(6, 6, 1.0, Vec2f::new(-2.5, -20.0), hull);

        let mut rng = StdRng::seed_from_u64(7);
        let structure = builder.build_structure(&params, &mut rng).expect("valid ship");
        let frontiers = Frontiers::build(&structure.points, &structure.springs, &structure.triangles);
        let points = &structure.points;

        let mut forces = vec![Vec2f::ZERO; points.point_count()];
        let stats = update_static_pressure(
            &frontiers,
            &PressureInputs {
                position: &points.position,
                is_hull: &points.is_hull,
                internal_pressure: &points.internal_pressure,
            },
            &mut forces,
            &CalmSea::default(),
            1.2754,
            1000.0,
            1.0,
            &params,
        );

        let net: Vec2f = forces.iter().fold(Vec2f::ZERO, |acc, f| acc + *f);
        let largest = forces.iter().map(|f| f.length()).fold(0.0f32, f32::max);
        assert!(largest > 0.0);
        // Residual is tiny compared to the individual forces
        assert!(net.length() < largest * 0.05);
        assert!(stats.iterations_percentage_average > 0.0);

        // Forces on the corners point inwards
        let corner = 0;
        let inward = Vec2f::new(0.0, -17.5) - points.position(corner);
        assert!(forces[corner].dot(inward) >= 0.0);
    }
}
