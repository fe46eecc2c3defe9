//! Tools and effects acting on the ship from outside the regular pipeline:
//! queued force interactions, explosions, anti-matter bombs, destroy and
//! repair tools, doors and electric sparks.

use std::f32::consts::TAU;

use rand::Rng;

use hullsim_logic::constants::interaction_constants::{
    ANTI_MATTER_EXPLOSION_STRENGTH, ANTI_MATTER_IMPLOSION_STRENGTH, ANTI_MATTER_PREIMPLOSION_STRENGTH,
    ANTI_MATTER_PREIMPLOSION_THICKNESS, BLAST_FORCE_BASE, DESTROY_DETACH_MAX_VELOCITY, DESTROY_DETACH_MIN_VELOCITY,
    DRAW_FORCE, ELECTRIC_SPARK_HEAT, EXPLOSION_DETACH_VELOCITY, REPAIR_MAX_SPRING_STRETCH, SWIRL_FORCE,
    ULTRA_VIOLENT_ANTI_MATTER_MULTIPLIER, ULTRA_VIOLENT_BLAST_MULTIPLIER, ULTRA_VIOLENT_SPARK_HEAT_MULTIPLIER,
};
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use super::Ship;
use crate::collaborators::ExplosionRequest;
use crate::state_machines::{explosion_ocean_displacement, ExplosionStateMachine, StateMachine};
use crate::types::{ElementIndex, RecordedEvent};

/// Force interaction queued by a tool and applied at the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    Blast {
        center: Vec2f,
        radius: f32,
        force_multiplier: f32,
    },
    Draw {
        center: Vec2f,
        strength: f32,
    },
    /// Spring-like pull of one point towards `target`; `stiffness` is the
    /// fraction of the distance covered in one step.
    Pull {
        point: ElementIndex,
        target: Vec2f,
        stiffness: f32,
    },
    Swirl {
        center: Vec2f,
        strength: f32,
    },
}

impl Ship {
    //
    // Queued interactions
    //

    pub fn apply_blast_at(&mut self, center: Vec2f, radius: f32, force_multiplier: f32) {
        self.queued_interactions.push(Interaction::Blast {
            center,
            radius,
            force_multiplier,
        });
    }

    pub fn draw_to(&mut self, center: Vec2f, strength: f32) {
        self.queued_interactions.push(Interaction::Draw { center, strength });
    }

    pub fn pull(&mut self, point: ElementIndex, target: Vec2f, stiffness: f32) {
        self.queued_interactions.push(Interaction::Pull {
            point,
            target,
            stiffness,
        });
    }

    pub fn swirl_at(&mut self, center: Vec2f, strength: f32) {
        self.queued_interactions.push(Interaction::Swirl { center, strength });
    }

    /// Turn every queued interaction into static forces and clear the queue.
    pub(crate) fn apply_queued_interaction_forces(&mut self, params: &SimulationParameters) {
        for interaction in std::mem::take(&mut self.queued_interactions) {
            match interaction {
                Interaction::Blast {
                    center,
                    radius,
                    force_multiplier,
                } => self.apply_blast_forces(center, radius, force_multiplier, params),
                Interaction::Draw { center, strength } => {
                    self.apply_radial_field(center, |direction, distance| {
                        direction * (-DRAW_FORCE * strength / (0.1 + distance).sqrt())
                    });
                }
                Interaction::Pull {
                    point,
                    target,
                    stiffness,
                } => self.apply_pull(point, target, stiffness),
                Interaction::Swirl { center, strength } => {
                    self.apply_radial_field(center, |direction, distance| {
                        direction.to_perpendicular() * (SWIRL_FORCE * strength / (0.1 + distance).sqrt())
                    });
                }
            }
        }
    }

    fn apply_blast_forces(&mut self, center: Vec2f, radius: f32, force_multiplier: f32, params: &SimulationParameters) {
        let strength = BLAST_FORCE_BASE
            * force_multiplier
            * if params.is_ultra_violent_mode {
                ULTRA_VIOLENT_BLAST_MULTIPLIER
            } else {
                1.0
            };
        let square_radius = radius * radius;

        for p in 0..self.points.point_count() {
            let offset = self.points.position[p] - center;
            if offset.square_length() < square_radius {
                let distance = offset.length();
                self.points.static_force[p] += offset.normalise_with_length(distance) * (strength / (0.1 + distance).sqrt());
            }
        }
    }

    /// Add `force(direction, distance)` to every point, where `direction` is
    /// the unit vector from `center` to the point.
    fn apply_radial_field(&mut self, center: Vec2f, force: impl Fn(Vec2f, f32) -> Vec2f) {
        for p in 0..self.points.point_count() {
            let offset = self.points.position[p] - center;
            let distance = offset.length();
            self.points.static_force[p] += force(offset.normalise_with_length(distance), distance);
        }
    }

    fn apply_pull(&mut self, p: ElementIndex, target: Vec2f, stiffness: f32) {
        if p >= self.points.point_count() {
            log::warn!("Pull of point {} ignored: out of range", p);
            return;
        }
        let displacement = target - self.points.position[p];
        let dt = SIMULATION_STEP_TIME_DURATION;
        self.points.static_force[p] += displacement * (stiffness * self.points.mass[p] / (dt * dt));
        self.points.velocity[p] = Vec2f::ZERO;
    }

    //
    // Explosions
    //

    pub fn start_explosion(&mut self, current_simulation_time: f32, request: &ExplosionRequest) {
        let personality_seed = self.rng.gen::<f32>();
        self.state_machines
            .push(StateMachine::Explosion(ExplosionStateMachine::new(
                current_simulation_time,
                request.plane_id,
                request.center,
                request.blast_force,
                request.blast_force_radius,
                request.blast_heat,
                request.blast_heat_radius,
                request.kind,
                personality_seed,
            )));
        self.events.on_explosion_started(request.kind);

        log::debug!(
            "Ship {} explosion {:?} at ({:.1}, {:.1}), radius {:.1}",
            self.id,
            request.kind,
            request.center.x,
            request.center.y,
            request.blast_force_radius
        );
    }

    /// Advance every state machine, dropping the ones that completed.
    pub(crate) fn update_state_machines(&mut self, current_simulation_time: f32, params: &SimulationParameters) {
        let mut machines = std::mem::take(&mut self.state_machines);
        machines.retain_mut(|machine| match machine {
            StateMachine::Explosion(explosion) => self.update_explosion(explosion, current_simulation_time, params),
        });
        // Keep machines started while updating
        machines.append(&mut self.state_machines);
        self.state_machines = machines;
    }

    /// One step of an explosion; returns false once it is over.
    fn update_explosion(
        &mut self,
        explosion: &mut ExplosionStateMachine,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) -> bool {
        if !explosion.advance(current_simulation_time) {
            log::debug!("Ship {} explosion {:?} expired", self.id, explosion.kind);
            return false;
        }

        if explosion.is_first_frame {
            explosion.is_first_frame = false;

            if let Some(p) = self.closest_attached_point(explosion.center, explosion.plane_id, explosion.blast_radius) {
                let direction = (self.points.position[p] - explosion.center).normalise();
                let direction = if direction.square_length() > 0.0 {
                    direction
                } else {
                    Vec2f::new(0.0, 1.0)
                };
                self.detach_point(p, direction * EXPLOSION_DETACH_VELOCITY, current_simulation_time, params);
            }

            self.displace_ocean_for_explosion(explosion.center, explosion.blast_radius);
        }

        if explosion.is_blasting {
            if explosion.blast_progress() > 1.0 {
                explosion.is_blasting = false;
            } else {
                self.apply_explosion_blast(explosion);
            }
        }

        true
    }

    fn closest_attached_point(&self, center: Vec2f, plane_id: u32, radius: f32) -> Option<ElementIndex> {
        self.points
            .raw_ship_points()
            .filter(|&p| self.points.plane_id[p] <= plane_id && !self.points.connected_springs(p).is_empty())
            .map(|p| (p, (self.points.position[p] - center).square_length()))
            .filter(|&(_, d)| d <= radius * radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }

    fn displace_ocean_for_explosion(&mut self, center: Vec2f, blast_radius: f32) {
        let depth = self.world.depth(center);
        let (radius, height) = explosion_ocean_displacement(depth, blast_radius);
        if height == 0.0 {
            return;
        }
        // One sample per meter, tapering to zero at the edge
        let samples = radius.ceil() as i32;
        for i in -samples..=samples {
            let dx = i as f32;
            let amount = height * (1.0 - dx.abs() / radius).max(0.0);
            if amount != 0.0 {
                self.world.displace_ocean_surface_at(center.x + dx, amount);
            }
        }
    }

    fn apply_explosion_blast(&mut self, explosion: &ExplosionStateMachine) {
        let blast_radius = explosion.current_blast_radius();
        let heat = explosion.blast_heat * 1000.0 * SIMULATION_STEP_TIME_DURATION;

        for p in 0..self.points.point_count() {
            if self.points.plane_id[p] > explosion.plane_id {
                continue;
            }
            let offset = self.points.position[p] - explosion.center;
            let distance = offset.length();

            if distance < blast_radius {
                self.points.static_force[p] +=
                    offset.normalise_with_length(distance) * (explosion.blast_force / (0.1 + distance).sqrt());
            }

            if distance < explosion.blast_heat_radius {
                self.points.temperature[p] += heat * self.points.heat_capacity_reciprocal[p];
            }
        }
    }

    //
    // Anti-matter bomb
    //

    /// A thin shell at `radius` pushes points out of it, away from its middle.
    pub fn do_anti_matter_bomb_preimplosion(&mut self, center: Vec2f, radius: f32, params: &SimulationParameters) {
        let strength = ANTI_MATTER_PREIMPLOSION_STRENGTH * ultra_violent(params, ULTRA_VIOLENT_BLAST_MULTIPLIER);

        for p in 0..self.points.point_count() {
            let offset = self.points.position[p] - center;
            let distance = offset.length();
            let distance_from_radius = distance - radius;
            if distance_from_radius.abs() <= ANTI_MATTER_PREIMPLOSION_THICKNESS {
                let direction = if distance_from_radius >= 0.0 { 1.0 } else { -1.0 };
                let magnitude = strength * (1.0 - distance_from_radius.abs() / ANTI_MATTER_PREIMPLOSION_THICKNESS);
                self.points.static_force[p] += offset.normalise_with_length(distance) * (magnitude * direction);
            }
        }

        self.npcs
            .apply_anti_matter_bomb_preimplosion(self.id, center, radius, ANTI_MATTER_PREIMPLOSION_THICKNESS);
    }

    /// Everything spirals into `center`, harder as `progress` goes to 1.
    pub fn do_anti_matter_bomb_implosion(&mut self, center: Vec2f, progress: f32, params: &SimulationParameters) {
        let strength = progress
            * progress
            * params.anti_matter_bomb_implosion_strength
            * ANTI_MATTER_IMPLOSION_STRENGTH
            * ultra_violent(params, ULTRA_VIOLENT_ANTI_MATTER_MULTIPLIER);

        for p in 0..self.points.point_count() {
            let displacement = center - self.points.position[p];
            let distance = displacement.length();
            let direction = displacement.normalise_with_length(distance);
            let mass_normalization = self.points.mass[p] / 50.0;

            let angular = direction.to_perpendicular() * (strength * mass_normalization / 10.0);
            let radial = direction * (strength / (0.2 + 0.5 * distance.sqrt()) * mass_normalization * 10.0);
            self.points.static_force[p] += angular + radial;
        }

        self.npcs.apply_anti_matter_bomb_implosion(self.id, center, progress);
    }

    /// Single outward kick, at progress 0 only.
    pub fn do_anti_matter_bomb_explosion(&mut self, center: Vec2f, progress: f32, params: &SimulationParameters) {
        if progress != 0.0 {
            return;
        }

        let strength = ANTI_MATTER_EXPLOSION_STRENGTH * ultra_violent(params, ULTRA_VIOLENT_ANTI_MATTER_MULTIPLIER);
        for p in 0..self.points.point_count() {
            let offset = self.points.position[p] - center;
            let distance = offset.length();
            self.points.static_force[p] += offset.normalise_with_length(distance) * (strength / (0.1 + distance).sqrt());
        }

        self.npcs.apply_anti_matter_bomb_explosion(self.id, center);
    }

    //
    // Destroy and repair tools
    //

    /// Detach every attached point within `radius` of `center`, flinging it
    /// off at a random low speed. Returns the detaches performed, for replay.
    pub fn destroy_at(
        &mut self,
        center: Vec2f,
        radius: f32,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) -> Vec<RecordedEvent> {
        let square_radius = radius * radius;
        let targets: Vec<ElementIndex> = self
            .points
            .raw_ship_points()
            .filter(|&p| (self.points.position[p] - center).square_length() <= square_radius)
            .collect();

        let mut recorded = Vec::new();
        for p in targets {
            if self.points.connected_springs(p).is_empty() && !self.has_live_electrical_element(p) {
                continue;
            }
            let speed = self
                .rng
                .gen_range(DESTROY_DETACH_MIN_VELOCITY..DESTROY_DETACH_MAX_VELOCITY);
            let angle = self.rng.gen_range(0.0..TAU);
            let velocity = Vec2f::new(angle.cos(), angle.sin()) * speed;
            if let Some(event) = self.detach_point_for_destroy(p, velocity, current_simulation_time, params) {
                recorded.push(event);
            }
        }

        recorded
    }

    /// Detach `p` as the destroy tool does; returns the event to record when
    /// anything was destroyed.
    pub fn detach_point_for_destroy(
        &mut self,
        p: ElementIndex,
        velocity: Vec2f,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) -> Option<RecordedEvent> {
        if p >= self.points.raw_ship_point_count() {
            log::warn!("Detach of point {} ignored: not a ship point", p);
            return None;
        }
        self.detach_point(p, velocity, current_simulation_time, params)
            .then_some(RecordedEvent::PointDetachForDestroy {
                point: p,
                velocity,
                simulation_time: current_simulation_time,
            })
    }

    /// Re-apply a previously recorded structural event.
    pub fn replay_recorded_event(&mut self, event: &RecordedEvent, params: &SimulationParameters) {
        match *event {
            RecordedEvent::PointDetachForDestroy {
                point,
                velocity,
                simulation_time,
            } => {
                self.detach_point_for_destroy(point, velocity, simulation_time, params);
            }
        }
    }

    fn detach_point(
        &mut self,
        p: ElementIndex,
        velocity: Vec2f,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) -> bool {
        let detached = self.handle_point_detach(p, true, true, current_simulation_time, params);
        if detached {
            self.points.velocity[p] = velocity;
        }
        detached
    }

    fn has_live_electrical_element(&self, p: ElementIndex) -> bool {
        self.points
            .electrical_element(p)
            .is_some_and(|e| !self.electrical.is_deleted(e))
    }

    /// Restore broken factory springs and triangles whose endpoints are all
    /// within `radius` of `center`, then the points that became whole again.
    /// Springs whose endpoints drifted too far apart stay broken. Returns
    /// whether anything was repaired.
    pub fn repair_at(&mut self, center: Vec2f, radius: f32, current_simulation_time: f32) -> bool {
        let square_radius = radius * radius;
        let in_radius = |ship: &Ship, p: ElementIndex| (ship.points.position[p] - center).square_length() <= square_radius;
        let mut repaired_anything = false;

        for s in 0..self.springs.element_count() {
            if !self.springs.is_deleted(s) {
                continue;
            }
            let (a, b) = (self.springs.endpoint_a(s), self.springs.endpoint_b(s));
            if in_radius(self, a)
                && in_radius(self, b)
                && self.springs.length(s, &self.points) <= self.springs.rest_length(s) * REPAIR_MAX_SPRING_STRETCH
            {
                self.restore_spring(s, current_simulation_time);
                repaired_anything = true;
            }
        }

        for t in 0..self.triangles.element_count() {
            if !self.triangles.is_deleted(t) {
                continue;
            }
            if self.triangles.endpoints(t).iter().all(|&p| in_radius(self, p))
                && self
                    .triangles
                    .sub_springs(t)
                    .iter()
                    .all(|&s| !self.springs.is_deleted(s))
            {
                self.restore_triangle(t, current_simulation_time);
                repaired_anything = true;
            }
        }

        let candidates: Vec<ElementIndex> = self
            .points
            .raw_ship_points()
            .filter(|&p| self.points.is_damaged(p) && in_radius(self, p))
            .collect();
        for p in candidates {
            let was_damaged = self.damage.damaged_points;
            self.attempt_point_restore(p, current_simulation_time);
            repaired_anything |= self.damage.damaged_points != was_damaged;
        }

        if repaired_anything {
            self.repair_grace_period_multiplier = 0.0;
        }
        repaired_anything
    }

    //
    // Doors and sparks
    //

    /// Open or close the door at `p` by hand; no-op when already there.
    pub fn set_watertight_door(&mut self, p: ElementIndex, is_open: bool) {
        if self.points.is_hull(p) == is_open {
            self.handle_watertight_door_updated(p, is_open);
        }
    }

    /// Electrify, heat and rot `p`; a spark may also knock out or blow up
    /// its electrical element. `strength` is in [0, 1].
    pub fn handle_electric_spark(
        &mut self,
        p: ElementIndex,
        strength: f32,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) {
        self.points.is_electrified[p] = strength > 0.0;

        let heat = ELECTRIC_SPARK_HEAT * strength * ultra_violent(params, ULTRA_VIOLENT_SPARK_HEAT_MULTIPLIER);
        let delta_t = heat * self.points.heat_capacity_reciprocal[p];
        // Never below absolute zero
        self.points.temperature[p] = (self.points.temperature[p] + delta_t).max(0.1);

        let rot_coefficient = if params.is_ultra_violent_mode { 0.99 } else { 0.9995 } + (1.0 - strength) * 0.0003;
        self.points.decay[p] *= rot_coefficient;

        if let Some(e) = self.points.electrical_element(p) {
            if let Some(reason) = self.electrical.on_electric_spark(e, current_simulation_time, &mut self.rng) {
                self.destroy_electrical_element(e, reason, current_simulation_time, params);
            }
        }

        self.gadgets.on_electric_spark(p, current_simulation_time);
    }
}

fn ultra_violent(params: &SimulationParameters, multiplier: f32) -> f32 {
    if params.is_ultra_violent_mode {
        multiplier
    } else {
        1.0
    }
}
