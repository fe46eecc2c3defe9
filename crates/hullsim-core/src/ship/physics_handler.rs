//! Structural mutations of the ship.
//!
//! Every destroy has an exact inverse restore, and both keep the cross
//! references between points, springs, triangles, frontiers and electrical
//! elements in step. Destroying then restoring an element (with nothing in
//! between) gives back the same connectivity lists and frontier cycles.

use std::f32::consts::TAU;

use rand::Rng;

use hullsim_logic::constants::particle_constants::{
    MAX_DEBRIS_PARTICLES_LIFETIME, MAX_DEBRIS_PARTICLES_PER_EVENT, MAX_DEBRIS_PARTICLES_VELOCITY,
    MIN_DEBRIS_PARTICLES_LIFETIME, MIN_DEBRIS_PARTICLES_PER_EVENT, MIN_DEBRIS_PARTICLES_VELOCITY,
};
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use super::Ship;
use crate::types::{ElectricalDestroyReason, ElementIndex, SpringDestroyOptions};

impl Ship {
    //
    // Points
    //

    /// Cut every spring (and so every triangle) of `p` and drop its
    /// electrical element. Returns whether anything was destroyed.
    pub(crate) fn handle_point_detach(
        &mut self,
        p: ElementIndex,
        generate_debris: bool,
        fire_destroy_event: bool,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) -> bool {
        let mut has_anything_been_destroyed = false;

        while let Some(cs) = self.points.connected_springs(p).last().copied() {
            self.destroy_spring(
                cs.spring,
                SpringDestroyOptions {
                    fire_break_event: false,
                    destroy_all_triangles: true,
                },
                current_simulation_time,
                params,
            );
            has_anything_been_destroyed = true;
        }

        debug_assert!(self.points.connected_triangles(p).is_empty());

        if let Some(e) = self.points.electrical_element(p) {
            if !self.electrical.is_deleted(e) {
                let reason = if fire_destroy_event {
                    ElectricalDestroyReason::Other
                } else {
                    ElectricalDestroyReason::SilentRemoval
                };
                self.destroy_electrical_element(e, reason, current_simulation_time, params);
                has_anything_been_destroyed = true;
            }
        }

        if has_anything_been_destroyed {
            self.gadgets.on_point_detached(p, current_simulation_time);

            if generate_debris {
                let material_index = self.points.material_index(p);
                self.generate_debris(p, material_index, current_simulation_time, params);
            }

            if fire_destroy_event {
                let is_underwater = self.world.is_underwater(self.points.position(p));
                self.events.on_destroy(self.points.material(p), is_underwater, 1);
            }

            self.is_structure_dirty = true;
        }

        has_anything_been_destroyed
    }

    /// Restore a damaged point once it has all of its factory springs and
    /// triangles back.
    pub(crate) fn attempt_point_restore(&mut self, p: ElementIndex, current_simulation_time: f32) {
        if self.points.connected_springs(p).len() != self.points.factory_connected_springs(p).len()
            || self.points.connected_triangles(p).len() != self.points.factory_connected_triangles(p).len()
            || !self.points.is_damaged(p)
        {
            return;
        }

        self.points.restore(p);

        if let Some(e) = self.points.electrical_element(p) {
            if self.electrical.is_deleted(e) {
                self.restore_electrical_element(e);
            }
        }

        debug_assert!(self.damage.damaged_points > 0);
        self.damage.damaged_points = self.damage.damaged_points.saturating_sub(1);
        self.check_full_repair(current_simulation_time);
    }

    /// Throw a handful of debris particles off `p`.
    pub(crate) fn generate_debris(
        &mut self,
        p: ElementIndex,
        material_index: usize,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) {
        if !params.do_generate_debris {
            return;
        }

        let count = self
            .rng
            .gen_range(MIN_DEBRIS_PARTICLES_PER_EVENT..=MAX_DEBRIS_PARTICLES_PER_EVENT);
        for _ in 0..count {
            let speed = self
                .rng
                .gen_range(MIN_DEBRIS_PARTICLES_VELOCITY..MAX_DEBRIS_PARTICLES_VELOCITY);
            let angle = self.rng.gen_range(0.0..TAU);
            let lifetime = self
                .rng
                .gen_range(MIN_DEBRIS_PARTICLES_LIFETIME..MAX_DEBRIS_PARTICLES_LIFETIME);

            let spawned = self.points.create_ephemeral_debris(
                self.points.position(p),
                Vec2f::new(angle.cos(), angle.sin()) * speed,
                self.points.cached_depth(p),
                self.points.water(p),
                material_index,
                current_simulation_time,
                lifetime,
                self.points.plane_id(p),
                params,
            );
            if spawned.is_none() {
                break;
            }
        }
    }

    //
    // Springs
    //

    /// Destroy spring `s`, the triangles that depend on it, and the
    /// electrical link between its endpoints; damages both endpoints.
    pub(crate) fn destroy_spring(
        &mut self,
        s: ElementIndex,
        options: SpringDestroyOptions,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) {
        debug_assert!(!self.springs.is_deleted(s));

        let point_a = self.springs.endpoint_a(s);
        let point_b = self.springs.endpoint_b(s);

        self.points.disconnect_spring(point_a, s);
        self.points.disconnect_spring(point_b, s);
        for p in [point_a, point_b] {
            if self.points.connected_springs(p).is_empty() {
                self.points.on_orphaned(p);
            }
        }

        if options.destroy_all_triangles {
            self.destroy_connected_triangles(point_a);
            self.destroy_connected_triangles(point_b);
        } else {
            self.destroy_triangles_between(point_a, point_b);
        }

        for p in [point_a, point_b] {
            if self.points.damage(p, &mut self.rng, params) {
                self.damage.damaged_points += 1;
            }
        }

        if let (Some(ea), Some(eb)) = (
            self.points.electrical_element(point_a),
            self.points.electrical_element(point_b),
        ) {
            self.electrical.disconnect(ea, eb);
        }

        if options.fire_break_event {
            let is_underwater = self.world.is_underwater(self.points.position(point_a));
            let material = &self.points.materials[self.springs.base_material_index(s)];
            self.events.on_break(material, is_underwater, 1);
        }

        self.springs.mark_deleted(s);
        self.gadgets.on_spring_destroyed(s, current_simulation_time);

        self.is_structure_dirty = true;
        self.damage.broken_springs += 1;
    }

    /// Inverse of [`Ship::destroy_spring`] for the spring itself; triangles
    /// are restored separately.
    pub(crate) fn restore_spring(&mut self, s: ElementIndex, current_simulation_time: f32) {
        debug_assert!(self.springs.is_deleted(s));

        self.springs.mark_restored(s, &self.points);

        let point_a = self.springs.endpoint_a(s);
        let point_b = self.springs.endpoint_b(s);
        self.points.connect_spring(point_a, s, point_b);
        self.points.connect_spring(point_b, s, point_a);

        if let (Some(ea), Some(eb)) = (
            self.points.electrical_element(point_a),
            self.points.electrical_element(point_b),
        ) {
            if !self.electrical.is_deleted(ea) && !self.electrical.is_deleted(eb) {
                self.electrical.connect(ea, eb);
            }
        }

        let is_underwater = self.world.is_underwater(self.points.position(point_a));
        self.events.on_spring_repaired(self.points.material(point_a), is_underwater, 1);

        self.is_structure_dirty = true;
        debug_assert!(self.damage.broken_springs > 0);
        self.damage.broken_springs = self.damage.broken_springs.saturating_sub(1);
        self.check_full_repair(current_simulation_time);
    }

    //
    // Triangles
    //

    fn destroy_connected_triangles(&mut self, p: ElementIndex) {
        while let Some(t) = self.points.connected_triangles(p).last().copied() {
            self.destroy_triangle(t);
        }
    }

    /// Destroy the triangles having both `point_a` and `point_b` as vertices.
    fn destroy_triangles_between(&mut self, point_a: ElementIndex, point_b: ElementIndex) {
        let doomed: Vec<ElementIndex> = self
            .points
            .connected_triangles(point_a)
            .iter()
            .rev()
            .copied()
            .filter(|&t| self.triangles.contains_point(t, point_b))
            .collect();
        for t in doomed {
            self.destroy_triangle(t);
        }
    }

    pub(crate) fn destroy_triangle(&mut self, t: ElementIndex) {
        debug_assert!(!self.triangles.is_deleted(t));

        self.triangles.set_deleted(t, true);

        for s in self.triangles.sub_springs(t) {
            self.springs.remove_super_triangle(s, t);
        }
        for &s in self.triangles.covered_springs(t) {
            self.springs.remove_covering_triangle(s);
        }
        for (i, p) in self.triangles.endpoints(t).into_iter().enumerate() {
            self.points.disconnect_triangle(p, t, i == 0);
        }

        self.frontiers
            .handle_triangle_change(t, &self.points, &self.springs, &self.triangles);

        self.npcs.on_ship_triangle_destroyed(self.id, t);

        self.is_structure_dirty = true;
        self.damage.broken_triangles += 1;
    }

    pub(crate) fn restore_triangle(&mut self, t: ElementIndex, current_simulation_time: f32) {
        debug_assert!(self.triangles.is_deleted(t));

        self.triangles.set_deleted(t, false);

        for (i, p) in self.triangles.endpoints(t).into_iter().enumerate() {
            self.points.connect_triangle(p, t, i == 0);
        }
        for &s in self.triangles.covered_springs(t) {
            self.springs.add_covering_triangle(s);
        }
        for s in self.triangles.sub_springs(t) {
            self.springs.add_super_triangle(s, t);
        }

        self.frontiers
            .handle_triangle_change(t, &self.points, &self.springs, &self.triangles);

        let point_a = self.triangles.point_a(t);
        let is_underwater = self.world.is_underwater(self.points.position(point_a));
        self.events.on_triangle_repaired(self.points.material(point_a), is_underwater, 1);

        self.is_structure_dirty = true;
        debug_assert!(self.damage.broken_triangles > 0);
        self.damage.broken_triangles = self.damage.broken_triangles.saturating_sub(1);
        self.check_full_repair(current_simulation_time);
    }

    //
    // Electricals
    //

    pub(crate) fn destroy_electrical_element(
        &mut self,
        e: ElementIndex,
        reason: ElectricalDestroyReason,
        current_simulation_time: f32,
        params: &SimulationParameters,
    ) {
        self.electrical.disconnect_all(e);
        self.electrical.mark_deleted(e);

        let p = self.electrical.point_index(e);
        let is_underwater = self.world.is_underwater(self.points.position(p));

        match reason {
            ElectricalDestroyReason::LampBroken => self.events.on_lamp_broken(is_underwater, 1),
            ElectricalDestroyReason::LampExploded => {
                let glass = self.points.glass_material;
                self.generate_debris(p, glass, current_simulation_time, params);
                self.events.on_lamp_exploded(is_underwater, 1);
            }
            ElectricalDestroyReason::LampImploded => self.events.on_lamp_imploded(is_underwater, 1),
            ElectricalDestroyReason::Other | ElectricalDestroyReason::SilentRemoval => {}
        }
    }

    /// Bring `e` back and reconnect it to the live elements across the
    /// point's springs.
    fn restore_electrical_element(&mut self, e: ElementIndex) {
        self.electrical.mark_restored(e);

        let p = self.electrical.point_index(e);
        let neighbors: Vec<ElementIndex> = self
            .points
            .connected_springs(p)
            .iter()
            .filter_map(|cs| self.points.electrical_element(cs.other_endpoint))
            .filter(|&other| !self.electrical.is_deleted(other))
            .collect();
        for other in neighbors {
            self.electrical.connect(e, other);
        }
    }

    //
    // Hullness
    //

    /// A closed door is hull; springs touching a hull point stop carrying water.
    pub(crate) fn set_and_propagate_hullness(&mut self, p: ElementIndex, is_hull: bool) {
        self.points.set_is_hull(p, is_hull);

        let updates: Vec<(ElementIndex, f32)> = self
            .points
            .connected_springs(p)
            .iter()
            .map(|cs| {
                let permeability = if is_hull || self.points.is_hull(cs.other_endpoint) {
                    0.0
                } else {
                    1.0
                };
                (cs.spring, permeability)
            })
            .collect();
        for (s, permeability) in updates {
            self.springs.set_water_permeability(s, permeability);
        }
    }

    pub(crate) fn handle_watertight_door_updated(&mut self, p: ElementIndex, is_open: bool) {
        self.set_and_propagate_hullness(p, !is_open);

        let is_underwater = self.world.is_underwater(self.points.position(p));
        if is_open {
            self.points.unseal_structural_leak(p);
            self.events.on_watertight_door_opened(is_underwater, 1);
        } else {
            self.points.seal_structural_leak(p);
            self.points.set_water(p, 0.0);
            self.events.on_watertight_door_closed(is_underwater, 1);
        }
    }

    //
    // Repair bookkeeping
    //

    fn check_full_repair(&mut self, current_simulation_time: f32) {
        if self.damage.is_pristine() {
            log::info!("Ship {} fully repaired", self.id);
            self.events.on_ship_repaired(self.id);
            self.npcs.on_ship_repaired(self.id, current_simulation_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SimulationEvent;
    use crate::ship::test_ships::{grid_ship, TestShip};
    use crate::types::EphemeralType;

    fn spring_between(ship: &Ship, a: ElementIndex, b: ElementIndex) -> ElementIndex {
        (0..ship.springs.element_count())
            .find(|&s| {
                let (pa, pb) = (ship.springs.endpoint_a(s), ship.springs.endpoint_b(s));
                (pa == a && pb == b) || (pa == b && pb == a)
            })
            .expect("spring exists")
    }

    fn connectivity_lists(ship: &Ship) -> Vec<(Vec<(usize, usize)>, Vec<usize>)> {
        ship.points
            .raw_ship_points()
            .map(|p| {
                (
                    ship.points
                        .connected_springs(p)
                        .iter()
                        .map(|cs| (cs.spring, cs.other_endpoint))
                        .collect(),
                    ship.points.connected_triangles(p).to_vec(),
                )
            })
            .collect()
    }

    fn break_options() -> SpringDestroyOptions {
        SpringDestroyOptions {
            fire_break_event: true,
            destroy_all_triangles: false,
        }
    }

    #[test]
    fn test_destroy_edge_spring_removes_its_triangle_and_damages_endpoints() {
        let TestShip {
            mut ship,
            params,
            recorder,
        } = grid_ship(3, 3);
        // Bottom edge of the bottom-left cell
        let s = spring_between(&ship, 0, 1);
        assert_eq!(ship.springs.super_triangles(s).len(), 1);

        ship.destroy_spring(s, break_options(), 0.0, &params);

        assert!(ship.springs.is_deleted(s));
        assert!(ship.points.is_damaged(0));
        assert!(ship.points.is_damaged(1));
        assert_eq!(ship.damage().broken_springs, 1);
        assert_eq!(ship.damage().broken_triangles, 1);
        assert_eq!(ship.damage().damaged_points, 2);
        assert!(ship.is_structure_dirty());
        assert_eq!(recorder.count(|e| matches!(e, SimulationEvent::Break { .. })), 1);
        assert_eq!(ship.verify_invariants(), Ok(()));
    }

    #[test]
    fn test_destroy_then_restore_spring_and_triangle_is_identity() {
        let TestShip {
            mut ship,
            params,
            recorder,
        } = grid_ship(4, 4);
        let lists_before = connectivity_lists(&ship);
        let frontiers_before = ship.frontiers.canonical_cycles();

        // Inner diagonal of cell (1, 1): both of its triangles go
        let s = spring_between(&ship, 5, 10);
        let doomed: Vec<ElementIndex> = ship.springs.super_triangles(s).to_vec();
        assert_eq!(doomed.len(), 2);

        ship.destroy_spring(s, break_options(), 0.0, &params);
        assert_eq!(ship.frontiers.frontier_count(), 2);
        assert_eq!(ship.verify_invariants(), Ok(()));

        ship.restore_spring(s, 1.0);
        for t in doomed {
            ship.restore_triangle(t, 1.0);
        }
        for p in ship.points.raw_ship_points() {
            ship.attempt_point_restore(p, 1.0);
        }

        assert_eq!(connectivity_lists(&ship), lists_before);
        assert_eq!(ship.frontiers.canonical_cycles(), frontiers_before);
        assert!(ship.damage().is_pristine());
        assert_eq!(recorder.count(|e| matches!(e, SimulationEvent::ShipRepaired(_))), 1);
        assert_eq!(ship.verify_invariants(), Ok(()));
    }

    #[test]
    fn test_point_detach_cuts_everything_and_spawns_debris() {
        let TestShip {
            mut ship,
            params,
            recorder,
        } = grid_ship(3, 3);
        let center = 4;

        assert!(ship.handle_point_detach(center, true, true, 0.0, &params));

        assert!(ship.points.connected_springs(center).is_empty());
        assert!(ship.points.connected_triangles(center).is_empty());
        assert_eq!(ship.triangles.live_count(), 0);
        assert_eq!(recorder.count(|e| matches!(e, SimulationEvent::Destroy { .. })), 1);
        // Springs cut by a detach don't fire break events
        assert_eq!(recorder.count(|e| matches!(e, SimulationEvent::Break { .. })), 0);

        let debris = ship
            .points
            .ephemeral_points()
            .filter(|&p| ship.points.ephemeral_type(p) == EphemeralType::Debris)
            .count();
        assert!((MIN_DEBRIS_PARTICLES_PER_EVENT..=MAX_DEBRIS_PARTICLES_PER_EVENT).contains(&debris));

        // Nothing left to cut
        assert!(!ship.handle_point_detach(center, true, true, 0.0, &params));
        assert_eq!(ship.verify_invariants(), Ok(()));
    }

    #[test]
    fn test_no_debris_when_disabled() {
        let TestShip { mut ship, mut params, .. } = grid_ship(3, 3);
        params.do_generate_debris = false;

        ship.handle_point_detach(4, true, false, 0.0, &params);

        assert_eq!(ship.points.live_ephemeral_count(), 0);
    }

    #[test]
    fn test_point_restore_requires_factory_springs() {
        let TestShip { mut ship, params, .. } = grid_ship(3, 3);
        let s = spring_between(&ship, 0, 1);
        ship.destroy_spring(s, break_options(), 0.0, &params);

        ship.attempt_point_restore(0, 0.0);
        assert!(ship.points.is_damaged(0));
        assert_eq!(ship.damage().damaged_points, 2);
    }

    #[test]
    fn test_closing_door_makes_springs_impermeable_and_dries_point() {
        let TestShip {
            mut ship, recorder, ..
        } = grid_ship(3, 3);
        ship.points.set_water(4, 0.7);

        ship.handle_watertight_door_updated(4, false);
        assert!(ship.points.is_hull(4));
        assert_eq!(ship.points.water(4), 0.0);
        for cs in ship.points.connected_springs(4) {
            assert_eq!(ship.springs.water_permeability(cs.spring), 0.0);
        }

        ship.handle_watertight_door_updated(4, true);
        assert!(!ship.points.is_hull(4));
        for cs in ship.points.connected_springs(4) {
            assert_eq!(ship.springs.water_permeability(cs.spring), 1.0);
        }
        assert_eq!(recorder.count(|e| matches!(e, SimulationEvent::WatertightDoorClosed)), 1);
        assert_eq!(recorder.count(|e| matches!(e, SimulationEvent::WatertightDoorOpened)), 1);
    }

    #[test]
    fn test_closed_door_stops_a_damaged_point_leaking() {
        let TestShip { mut ship, params, .. } = grid_ship(3, 3);
        let s = spring_between(&ship, 4, 5);
        ship.destroy_spring(s, break_options(), 0.0, &params);
        assert!(ship.points.leaking(4).is_cumulatively_leaking());

        ship.handle_watertight_door_updated(4, false);
        assert!(!ship.points.leaking(4).is_cumulatively_leaking());

        ship.handle_watertight_door_updated(4, true);
        assert_eq!(ship.points.leaking(4).structural_leak, 1.0);
    }
}
