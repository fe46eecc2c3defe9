//! Forces the world exerts on the ship: gravity, buoyancy, drag, wind,
//! water impact, and the ocean surface displaced in return.

use hullsim_logic::constants::physics_constants::*;
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::formulae::{
    kmh_to_ms, water_displacement_magnitude, water_displacement_max_depth, wind_speed_to_force_density,
};
use hullsim_logic::math::{linear_step, mix, step};
use hullsim_logic::parameters::SimulationParameters;

use crate::events::SimulationEventHandler;
use crate::frontiers::Frontiers;
use crate::points::Points;
use crate::types::FrontierType;
use crate::world::ShipWorld;

/// Scale of the surface displacement caused by one frontier point.
const DISPLACEMENT_SCALE: f32 = 0.4;

/// Gravity, buoyancy, friction drag and global wind on every point. Fills
/// `new_depths` with the depth of each point.
pub(crate) fn apply_world_particle_forces(
    points: &mut Points,
    new_depths: &mut [f32],
    world: &dyn ShipWorld,
    air_density: f32,
    water_density: f32,
    params: &SimulationParameters,
) {
    let air_friction_drag = AIR_FRICTION_DRAG_COEFFICIENT * params.air_friction_drag_adjustment;
    let water_friction_drag = WATER_FRICTION_DRAG_COEFFICIENT * params.water_friction_drag_adjustment;
    let global_wind_force = wind_speed_to_force_density(kmh_to_ms(world.current_wind_speed()), air_density);

    for p in 0..points.point_count() {
        let position = points.position[p];
        let depth = world.depth(position);
        new_depths[p] = depth;

        // 0.0 above water, 1.0 under water
        let uw = (depth * points.air_water_interface_inverse_width[p]).clamp(0.0, 1.0);

        let mut force = GRAVITY * points.mass[p];

        let buoyancy = points.buoyancy[p];
        let push = buoyancy.coefficient1 + buoyancy.coefficient2 * points.temperature[p];
        force.y += push * mix(air_density, water_density, uw);

        force += -points.velocity[p] * mix(air_friction_drag, water_friction_drag, uw);

        force += global_wind_force * points.wind_receptivity[p] * (1.0 - uw);

        points.static_force[p] += force;
    }

    let Some(field) = world.current_radial_wind_field() else {
        return;
    };

    // Only above-water points feel a radial wind
    for p in 0..points.point_count() {
        if new_depths[p] > 0.0 {
            continue;
        }
        let displacement = points.position[p] - field.source_pos;
        let radius = displacement.length();
        if radius >= field.pre_front_radius {
            continue;
        }
        let magnitude = if radius < field.main_front_radius {
            field.main_front_wind_force_magnitude
        } else {
            field.pre_front_wind_force_magnitude
        };
        points.static_force[p] +=
            displacement.normalise_with_length(radius) * magnitude * points.wind_receptivity[p];
    }
}

/// Pressure drag and water impact on the external frontiers, displacing the
/// ocean surface where points cross it. Depths are compared against the
/// cached depths of the previous step, which `new_depths` then replaces.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_world_surface_forces(
    points: &mut Points,
    frontiers: &Frontiers,
    new_depths: &mut Vec<f32>,
    world: &mut dyn ShipWorld,
    events: &mut dyn SimulationEventHandler,
    air_density: f32,
    water_density: f32,
    params: &SimulationParameters,
) {
    let air_pressure_drag =
        AIR_PRESSURE_DRAG_COEFFICIENT * params.air_pressure_drag_adjustment * (air_density / AIR_MASS);
    let water_pressure_drag =
        WATER_PRESSURE_DRAG_COEFFICIENT * params.water_pressure_drag_adjustment * (water_density / WATER_MASS);
    let water_impact = params.water_impact_force_adjustment * (water_density / WATER_MASS);

    let mut total_displacement = 0.0;

    for (_, frontier) in frontiers.iter() {
        if frontier.frontier_type != FrontierType::External {
            continue;
        }

        let mut e = frontier.start_edge;
        for _ in 0..frontier.size {
            let edge = frontiers.edge(e);
            let this = edge.point_a;
            let previous = frontiers.edge(edge.prev).point_a;
            let next = edge.point_b;
            e = edge.next;

            let depth = new_depths[this];
            let velocity = points.velocity[this];
            let mass = points.mass[this];

            // Outward normal
            let normal = (points.position[next] - points.position[previous])
                .normalise()
                .to_perpendicular();

            // No suction on surfaces facing away from the velocity
            let normal_velocity = velocity.dot(normal).max(0.0);

            let max_drag = mass * normal_velocity / SIMULATION_STEP_TIME_DURATION;
            let drag_coefficient = mix(air_pressure_drag, water_pressure_drag, depth.clamp(0.0, 1.0));
            let drag = (drag_coefficient * normal_velocity).min(max_drag);

            // Only on the step the point enters the water
            let impact = normal_velocity * normal_velocity * mass
                * water_impact
                * step(points.cached_depth[this], 0.0)
                * step(0.0, depth);

            points.static_force[this] += -normal * (drag + impact);

            if params.do_displace_water {
                let vertical_velocity = velocity.y;
                let attenuation =
                    1.0 - linear_step(0.0, water_displacement_max_depth(vertical_velocity), depth);
                let sign = if vertical_velocity >= 0.0 { 1.0 } else { -1.0 };
                let displacement = water_displacement_magnitude(
                    vertical_velocity.abs(),
                    params.water_displacement_wave_height_adjustment,
                ) * attenuation
                    * sign
                    * step(0.0, depth)
                    * DISPLACEMENT_SCALE;

                world.displace_ocean_surface_at(points.position[this].x, displacement);
                total_displacement += displacement.abs();
            }
        }
    }

    std::mem::swap(&mut points.cached_depth, new_depths);

    if params.do_displace_water {
        events.on_water_displaced(total_displacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CalmSea, RadialWindField};
    use hullsim_logic::formulae::{air_density, water_density};
    use hullsim_logic::materials::MaterialPreset;
    use hullsim_logic::vectors::Vec2f;

    fn points_at(positions: &[Vec2f]) -> (Points, SimulationParameters) {
        let params = SimulationParameters::default();
        let mut points = Points::new(vec![MaterialPreset::Wood.material()], &params);
        for &position in positions {
            points.add(position, 0, 0.0, false, 0.5, &params);
        }
        points.finalize(0, &params);
        (points, params)
    }

    #[test]
    fn test_underwater_wood_is_pushed_up() {
        let (mut points, params) = points_at(&[Vec2f::new(0.0, -10.0), Vec2f::new(0.0, 10.0)]);
        let sea = CalmSea::default();
        let mut depths = vec![0.0; points.point_count()];
        apply_world_particle_forces(
            &mut points,
            &mut depths,
            &sea,
            air_density(params.air_temperature, &params),
            water_density(params.water_temperature, &params),
            &params,
        );

        assert_eq!(depths, vec![10.0, -10.0]);
        // Wood floats: buoyancy wins underwater, gravity wins in the air
        assert!(points.static_force(0).y > 0.0);
        assert!(points.static_force(1).y < 0.0);
    }

    #[test]
    fn test_interface_width_is_per_point() {
        let (mut points, params) = points_at(&[Vec2f::new(0.0, -0.25), Vec2f::new(5.0, -0.25)]);
        points.set_air_water_interface_inverse_width(1, 4.0);
        let mut depths = vec![0.0; points.point_count()];
        apply_world_particle_forces(
            &mut points,
            &mut depths,
            &CalmSea::default(),
            air_density(params.air_temperature, &params),
            water_density(params.water_temperature, &params),
            &params,
        );

        // Same depth, but the second point is already fully submerged
        assert_eq!(points.air_water_interface_inverse_width(0), 1.0);
        assert!(points.static_force(1).y > points.static_force(0).y);
    }

    #[test]
    fn test_radial_wind_only_above_water_within_front() {
        let (mut points, params) = points_at(&[
            Vec2f::new(5.0, 1.0),
            Vec2f::new(5.0, -1.0),
            Vec2f::new(500.0, 1.0),
        ]);
        points.wind_receptivity.iter_mut().for_each(|r| *r = 1.0);

        let sea = CalmSea::default().with_radial_wind_field(RadialWindField {
            source_pos: Vec2f::new(0.0, 1.0),
            pre_front_radius: 100.0,
            pre_front_wind_force_magnitude: 10.0,
            main_front_radius: 50.0,
            main_front_wind_force_magnitude: 100.0,
        });
        let mut depths = vec![0.0; points.point_count()];
        apply_world_particle_forces(&mut points, &mut depths, &sea, 1.0, 1000.0, &params);

        let baseline = GRAVITY.x * points.mass(0);
        assert!(points.static_force(0).x > baseline + 99.0);
        assert!((points.static_force(1).x - baseline).abs() < 1e-3);
        assert!((points.static_force(2).x - baseline).abs() < 1e-3);
    }
}
