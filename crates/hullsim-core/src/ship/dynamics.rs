//! Mechanical dynamics - spring relaxation, integration, sea floor and world bounds

use hullsim_logic::constants::dynamics_constants::{
    KINETIC_FRICTION_THRESHOLD, MAX_BOUNCE_VELOCITY, MAX_FLOOR_ROLLBACK, MAX_VELOCITY_FOR_SILTING,
    SEA_FLOOR_COLLISION_PERIOD,
};
use hullsim_logic::constants::world_constants::{HALF_MAX_WORLD_HEIGHT, HALF_MAX_WORLD_WIDTH};
use hullsim_logic::formulae::OceanFloorCollisionFactors;
use hullsim_logic::math::linear_step;
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::points::Points;
use crate::springs::Springs;
use crate::world::ShipWorld;

/// Depth below the floor surface within which silt softens the response.
const SILT_DEPTH: f32 = 40.0;

/// Add Hooke and damping forces of every spring to the dynamic forces of
/// its endpoints. Deleted springs have zero coefficients and add nothing.
pub fn apply_spring_forces(springs: &Springs, points: &mut Points) {
    for s in 0..springs.element_count() {
        let endpoints = springs.endpoints[s];
        let (a, b) = (endpoints.point_a, endpoints.point_b);

        let displacement = points.position[b] - points.position[a];
        let length = displacement.length();
        let direction = displacement.normalise_with_length(length);

        let hooke = (length - springs.rest_length[s]) * springs.stiffness_coefficient[s];
        let relative_velocity = points.velocity[b] - points.velocity[a];
        let damping = relative_velocity.dot(direction) * springs.damping_coefficient[s];

        let force = direction * (hooke + damping);
        points.dynamic_force[a] += force;
        points.dynamic_force[b] -= force;
    }
}

/// Move the dynamic forces accumulated by the static pressure pass into
/// the dynamic force buffer.
pub(crate) fn apply_static_pressure_forces(points: &mut Points) {
    for (dynamic, pressure) in points.dynamic_force.iter_mut().zip(points.static_pressure_force.iter()) {
        *dynamic += *pressure;
    }
}

/// Verlet-style step: displacement from velocity and forces, velocity from
/// the damped displacement, then clear the dynamic forces.
pub fn integrate_and_reset_dynamic_forces(points: &mut Points, dt: f32, velocity_factor: f32) {
    for p in 0..points.point_count() {
        let delta = points.velocity[p] * dt
            + (points.dynamic_force[p] + points.static_force[p]) * points.integration_factor[p];
        points.position[p] += delta;
        points.velocity[p] = delta * velocity_factor;
        points.dynamic_force[p] = Vec2f::ZERO;
    }
}

/// Bounce points that went under the ocean floor. Runs every
/// [`SEA_FLOOR_COLLISION_PERIOD`] sub-iterations, so it uses a
/// correspondingly longer dt.
pub(crate) fn handle_collisions_with_sea_floor(
    points: &mut Points,
    factors: &[OceanFloorCollisionFactors],
    world: &dyn ShipWorld,
    params: &SimulationParameters,
) {
    let dt = params.mechanical_simulation_step_time_duration() * SEA_FLOOR_COLLISION_PERIOD as f32;
    let silt_hardness = params.ocean_floor_silt_hardness;

    for p in 0..points.point_count() {
        let mut position = points.position[p];
        position.x = position.x.clamp(-HALF_MAX_WORLD_WIDTH, HALF_MAX_WORLD_WIDTH);

        let Some((floor_height, cell)) = world.ocean_floor_height_if_underneath(position.x, position.y) else {
            continue;
        };

        let velocity = points.velocity[p];
        let anti_normal = -world.ocean_floor_normal_at(cell);
        let approach = velocity.dot(anti_normal);
        if approach <= 0.0 {
            // Already moving away
            continue;
        }

        let material_factors = factors[points.material[p]];

        let normal_velocity = anti_normal * approach;
        let tangential_velocity = velocity - normal_velocity;

        let normal_response = normal_velocity * material_factors.elasticity_factor;
        let friction_factor = if tangential_velocity.x.abs() > KINETIC_FRICTION_THRESHOLD
            || tangential_velocity.y.abs() > KINETIC_FRICTION_THRESHOLD
        {
            material_factors.kinetic_friction_factor
        } else {
            material_factors.static_friction_factor
        };
        let tangential_response = tangential_velocity * friction_factor;

        let hardness = if floor_height - position.y < SILT_DEPTH {
            silt_hardness
                + (1.0 - silt_hardness)
                    * linear_step(0.0, MAX_VELOCITY_FOR_SILTING, velocity.square_length())
        } else {
            1.0
        };

        // Roll back, but not too far
        let mut rollback = velocity * dt * hardness;
        let rollback_length = rollback.length();
        if rollback_length > MAX_FLOOR_ROLLBACK {
            rollback = rollback.normalise_with_length(rollback_length) * MAX_FLOOR_ROLLBACK;
        }
        points.position[p] = position - rollback;
        points.velocity[p] = (normal_response + tangential_response) * hardness;
    }
}

/// Keep every point inside the world, bouncing it back elastically.
pub(crate) fn trim_for_world_bounds(points: &mut Points, params: &SimulationParameters) {
    const MIN_X: f32 = -HALF_MAX_WORLD_WIDTH;
    const MAX_X: f32 = HALF_MAX_WORLD_WIDTH;
    const MIN_Y: f32 = -HALF_MAX_WORLD_HEIGHT;
    const MAX_Y: f32 = HALF_MAX_WORLD_HEIGHT;

    let elasticity = params.ocean_floor_elasticity_coefficient * params.elasticity_adjustment;

    for p in 0..points.point_count() {
        let position = &mut points.position[p];
        let velocity = &mut points.velocity[p];

        if position.x < MIN_X {
            position.x = (MIN_X + elasticity * (MIN_X - position.x)).min(0.0);
            velocity.x = (-velocity.x).min(MAX_BOUNCE_VELOCITY);
        } else if position.x > MAX_X {
            position.x = (MAX_X - elasticity * (position.x - MAX_X)).max(0.0);
            velocity.x = (-velocity.x).max(-MAX_BOUNCE_VELOCITY);
        }

        if position.y < MIN_Y {
            position.y = (MIN_Y + elasticity * (MIN_Y - position.y)).min(0.0);
            velocity.y = (-velocity.y).min(MAX_BOUNCE_VELOCITY);
        } else if position.y > MAX_Y {
            position.y = (MAX_Y - elasticity * (position.y - MAX_Y)).max(0.0);
            velocity.y = (-velocity.y).max(-MAX_BOUNCE_VELOCITY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CalmSea;
    use hullsim_logic::formulae::ocean_floor_collision_factors;
    use hullsim_logic::materials::MaterialPreset;

    fn single_point(position: Vec2f, velocity: Vec2f) -> (Points, SimulationParameters) {
        let params = SimulationParameters::default();
        let mut points = Points::new(vec![MaterialPreset::Steel.material()], &params);
        points.add(position, 0, 0.0, false, 0.5, &params);
        points.finalize(0, &params);
        points.set_velocity(0, velocity);
        (points, params)
    }

    #[test]
    fn test_trim_bounces_back_inside() {
        let (mut points, params) = single_point(Vec2f::new(-HALF_MAX_WORLD_WIDTH - 10.0, 0.0), Vec2f::new(-500.0, 0.0));
        trim_for_world_bounds(&mut points, &params);

        let position = points.position(0);
        assert!(position.x >= -HALF_MAX_WORLD_WIDTH);
        assert_eq!(points.velocity(0).x, MAX_BOUNCE_VELOCITY);
    }

    #[test]
    fn test_trim_leaves_inside_points_alone() {
        let (mut points, params) = single_point(Vec2f::new(10.0, -20.0), Vec2f::new(3.0, 4.0));
        trim_for_world_bounds(&mut points, &params);
        assert_eq!(points.position(0), Vec2f::new(10.0, -20.0));
        assert_eq!(points.velocity(0), Vec2f::new(3.0, 4.0));
    }

    #[test]
    fn test_floor_collision_reverses_downward_velocity() {
        let (mut points, params) = single_point(Vec2f::new(0.0, -100.5), Vec2f::new(0.0, -10.0));
        let sea = CalmSea::new(100.0);
        let material = points.material(0).clone();
        let factors = vec![ocean_floor_collision_factors(
            material.elasticity_coefficient,
            material.static_friction_coefficient,
            material.kinetic_friction_coefficient,
            &params,
        )];

        handle_collisions_with_sea_floor(&mut points, &factors, &sea, &params);

        assert!(points.velocity(0).y >= 0.0);
        // Rolled back by at most the cap
        assert!(points.position(0).y > -100.5);
        assert!(points.position(0).y <= -100.5 + MAX_FLOOR_ROLLBACK + 1e-5);
    }
}
