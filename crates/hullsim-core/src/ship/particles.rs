//! Ephemeral particle lifecycles: rising air bubbles and flying debris.

use std::f32::consts::PI;

use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::events::SimulationEventHandler;
use crate::points::Points;
use crate::types::EphemeralType;
use crate::world::ShipWorld;

/// Advance every live ephemeral particle; returns whether any expired.
pub(crate) fn update_ephemeral_particles(
    points: &mut Points,
    current_time: f32,
    world: &mut dyn ShipWorld,
    events: &mut dyn SimulationEventHandler,
    params: &SimulationParameters,
) -> bool {
    // Bubbles this close to the surface push it up
    let surfacing_offset = if params.do_displace_water { 1.0 } else { 0.0 };
    let mut any_expired = false;

    for p in points.ephemeral_points() {
        let state = points.ephemeral[p];
        let lifetime = current_time - state.start_time;

        match state.kind {
            EphemeralType::None => {}
            EphemeralType::AirBubble => {
                let depth = points.cached_depth[p];
                if depth <= 0.0 {
                    points.expire_ephemeral_particle(p, params);
                    any_expired = true;
                    continue;
                }

                let vortex = state.vortex_amplitude * (2.0 * PI * lifetime / state.vortex_period).sin();
                points.static_force[p] += Vec2f::new(vortex, 0.0);

                if depth < surfacing_offset {
                    world.displace_ocean_surface_at(points.position[p].x, (surfacing_offset - depth) / 2.0);
                    events.on_air_bubble_surfaced(1);
                }
            }
            EphemeralType::Debris => {
                if lifetime >= state.max_lifetime {
                    points.expire_ephemeral_particle(p, params);
                    any_expired = true;
                }
            }
        }
    }

    any_expired
}
